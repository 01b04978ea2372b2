//! JSON output formatting

use serde::Serialize;
use tunedex_core::{Identification, TrackMetadata};

/// Identification joined with metadata
#[derive(Debug, Serialize)]
pub struct IdentifiedTrack {
    pub track_id: i64,
    pub offset: i64,
    pub offset_seconds: f64,
    pub matches: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TrackMetadata>,
}

/// Result of `tdidentify`; `{"match": null}` when nothing matched
#[derive(Debug, Serialize)]
pub struct IdentifyOutput {
    #[serde(rename = "match")]
    pub matched: Option<IdentifiedTrack>,
}

impl IdentifyOutput {
    pub fn new(identification: Option<&Identification>, metadata: Option<TrackMetadata>) -> Self {
        Self {
            matched: identification.map(|id| IdentifiedTrack {
                track_id: id.track_id,
                offset: id.offset,
                offset_seconds: id.offset_seconds,
                matches: id.matches,
                metadata,
            }),
        }
    }
}

/// Render any result as pretty JSON
pub fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Print any result as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", to_json(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_renders_null() {
        let json = to_json(&IdentifyOutput::new(None, None)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({ "match": null }));
    }

    #[test]
    fn test_match_with_metadata() {
        let id = Identification {
            track_id: 4,
            offset: 120,
            matches: 37,
            offset_seconds: 2.786,
        };
        let meta = TrackMetadata {
            track_id: 4,
            title: Some("Four".into()),
            ..Default::default()
        };

        let json = to_json(&IdentifyOutput::new(Some(&id), Some(meta))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["match"]["track_id"], 4);
        assert_eq!(value["match"]["matches"], 37);
        assert_eq!(value["match"]["metadata"]["title"], "Four");
    }
}
