//! WAV decoding

use super::resample_to_target;
use crate::error::{MatchError, Result};
use std::path::Path;

/// Decoded audio data, channels interleaved
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl AudioData {
    /// Convert to mono by averaging channels
    pub fn to_mono(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}

/// Decode a PCM or float WAV file
pub fn decode_wav(path: &Path) -> Result<AudioData> {
    if !path.exists() {
        return Err(MatchError::input(format!(
            "audio file not found: {}",
            path.display()
        )));
    }

    let decode_err = |e: hound::Error| {
        MatchError::DependencyFailure(format!("failed to decode {}: {}", path.display(), e))
    };

    let mut reader = hound::WavReader::open(path).map_err(decode_err)?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(decode_err)?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(decode_err)?
        }
    };

    let frames = samples.len() / spec.channels.max(1) as usize;
    let duration_ms = (frames as f64 / spec.sample_rate as f64 * 1000.0) as u32;

    Ok(AudioData {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration_ms,
    })
}

/// Decode a WAV file into a mono waveform at `target_sample_rate`
pub fn load_wav(path: &Path, target_sample_rate: u32) -> Result<Vec<f32>> {
    let audio = decode_wav(path)?;
    log::debug!(
        "Decoded {} ({} Hz, {} channels, {} ms)",
        path.display(),
        audio.sample_rate,
        audio.channels,
        audio.duration_ms
    );

    let mono = audio.to_mono();
    resample_to_target(&mono, audio.sample_rate, target_sample_rate)
}
