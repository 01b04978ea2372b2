use serde::{Deserialize, Serialize};

/// A fingerprint posting as stored in `fingerprints`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Hash key, bit-cast from the unsigned 64-bit fingerprint
    pub hash: i64,
    pub track_id: i64,
    pub anchor_time: i32,
}

/// Input structure for one posting of a track being indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosting {
    pub hash: i64,
    pub anchor_time: i32,
}

/// Everything written for a track in one ingestion transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackIndex {
    pub track_id: i64,
    pub postings: Vec<NewPosting>,
    /// Flat little-endian f32 segment vectors
    pub segment_blob: Vec<u8>,
}

/// A row of `song_segments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRow {
    pub track_id: i64,
    pub vec: Vec<u8>,
    pub indexed_at: chrono::DateTime<chrono::Utc>,
}

/// Track metadata stored in `tracks`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_s: Option<f64>,
    pub image: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Input structure for creating or updating track metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrack {
    pub id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_s: Option<f64>,
    pub image: Option<String>,
}
