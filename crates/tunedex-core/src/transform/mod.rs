//! Short-time Fourier transform
//!
//! Hann-windowed STFT without centre padding: frame `k` covers samples
//! `k * hop .. k * hop + n_fft` and only complete frames are produced.

use crate::config::SpectrogramConfig;
use rustfft::{num_complex::Complex, FftPlanner};
use std::f32::consts::PI;

/// Smallest amplitude distinguished from silence
pub const AMIN: f32 = 1e-5;

/// Log-magnitude spectrogram
#[derive(Debug, Clone)]
pub struct Spectrogram {
    /// dB values [time_frame][frequency_bin], 0 dB at the loudest bin
    pub magnitudes: Vec<Vec<f32>>,
    /// Number of time frames
    pub num_frames: usize,
    /// Number of frequency bins (`n_fft / 2 + 1`)
    pub num_bins: usize,
}

impl Spectrogram {
    pub fn from_frames(magnitudes: Vec<Vec<f32>>, num_bins: usize) -> Self {
        Self {
            num_frames: magnitudes.len(),
            magnitudes,
            num_bins,
        }
    }
}

/// Number of complete STFT frames in `len` samples
pub fn frame_count(len: usize, n_fft: usize, hop: usize) -> usize {
    if len < n_fft {
        0
    } else {
        (len - n_fft) / hop + 1
    }
}

/// Linear magnitude STFT, [frame][bin]
pub fn stft_magnitudes(samples: &[f32], n_fft: usize, hop: usize) -> Vec<Vec<f32>> {
    let num_frames = frame_count(samples.len(), n_fft, hop);
    let num_bins = n_fft / 2 + 1;

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(n_fft);
    let window = create_hann_window(n_fft);

    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
    let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];
    let mut frames = Vec::with_capacity(num_frames);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(samples[start + i] * window[i], 0.0);
        }

        fft.process_with_scratch(&mut buffer, &mut scratch);

        frames.push(buffer[..num_bins].iter().map(|c| c.norm()).collect());
    }

    frames
}

/// Compute the dB spectrogram referenced to its own maximum
pub fn compute_spectrogram(samples: &[f32], config: &SpectrogramConfig) -> Spectrogram {
    let num_bins = config.n_fft / 2 + 1;
    let mut frames = stft_magnitudes(samples, config.n_fft, config.hop_length);

    let peak = frames
        .iter()
        .flat_map(|f| f.iter().copied())
        .fold(0.0f32, f32::max);

    if peak <= AMIN {
        // Silence: nothing rises above the floor.
        for frame in frames.iter_mut() {
            frame.iter_mut().for_each(|v| *v = -config.top_db);
        }
        return Spectrogram::from_frames(frames, num_bins);
    }

    let ref_db = 20.0 * peak.log10();
    for frame in frames.iter_mut() {
        for v in frame.iter_mut() {
            let db = 20.0 * v.max(AMIN).log10() - ref_db;
            *v = db.max(-config.top_db);
        }
    }

    Spectrogram::from_frames(frames, num_bins)
}

/// Create periodic Hann window
pub fn create_hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / size as f32).cos())
        .collect()
}
