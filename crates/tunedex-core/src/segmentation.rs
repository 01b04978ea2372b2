//! Waveform segmentation for similarity features
//!
//! Fixed-length windows start every `hop` samples; with `hop < length`
//! consecutive windows overlap. A trailing window shorter than the segment
//! length is dropped.

use crate::config::SegmentConfig;
use crate::error::{MatchError, Result};

/// Borrowed view of one segment
#[derive(Debug, Clone, Copy)]
pub struct AudioSegment<'a> {
    /// Segment identifier (0-based)
    pub segment_id: usize,
    /// First sample of the segment in the waveform
    pub start_sample: usize,
    pub samples: &'a [f32],
}

/// Split `waveform` into full-length segments. May return an empty vector.
pub fn segment_waveform<'a>(
    waveform: &'a [f32],
    seg_len: usize,
    hop_len: usize,
) -> Vec<AudioSegment<'a>> {
    if seg_len == 0 || hop_len == 0 || waveform.len() < seg_len {
        return Vec::new();
    }

    (0..=waveform.len() - seg_len)
        .step_by(hop_len)
        .enumerate()
        .map(|(segment_id, start)| AudioSegment {
            segment_id,
            start_sample: start,
            samples: &waveform[start..start + seg_len],
        })
        .collect()
}

/// Segment a waveform for indexing; too-short input is an error
pub fn segment_audio<'a>(
    waveform: &'a [f32],
    config: &SegmentConfig,
    sample_rate: u32,
) -> Result<Vec<AudioSegment<'a>>> {
    let (seg_len, hop_len) = config.lengths(sample_rate);
    let segments = segment_waveform(waveform, seg_len, hop_len);

    if segments.is_empty() {
        return Err(MatchError::input(format!(
            "track too short to index: {} samples, one segment needs {} ({:.2}s at {} Hz)",
            waveform.len(),
            seg_len,
            config.seg_duration_s,
            sample_rate
        )));
    }

    Ok(segments)
}
