//! Deterministic synthetic audio for tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;

use crate::config::{MatchConfig, SegmentConfig, SpectrogramConfig};

pub const SAMPLE_RATE: u32 = 8000;
pub const HOP: usize = 256;

/// Small configuration for fast tests: 8 kHz, 512-point FFT, 2 s segments
pub fn test_config() -> MatchConfig {
    let mut config = MatchConfig {
        sample_rate: SAMPLE_RATE,
        spectrogram: SpectrogramConfig {
            n_fft: 512,
            hop_length: HOP,
            top_db: 80.0,
        },
        segments: SegmentConfig {
            seg_duration_s: 2.0,
            hop_duration_s: 1.0,
        },
        ..MatchConfig::default()
    };
    // 50 Hz · 2^6 stays below the 4 kHz Nyquist frequency
    config.features.contrast_fmin = 50.0;
    config
}

/// A "melody": a new pair of random tones every 100 ms
pub fn synth_track(seed: u64, seconds: f32) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    let note_len = SAMPLE_RATE as usize / 10;

    let mut wave = vec![0.0f32; len];
    for (n, chunk) in wave.chunks_mut(note_len).enumerate() {
        let f1 = rng.gen_range(200.0..3000.0f32);
        let f2 = rng.gen_range(200.0..3000.0f32);
        let a1 = rng.gen_range(0.2..0.5f32);
        let a2 = rng.gen_range(0.1..0.3f32);
        let start = n * note_len;

        for (i, sample) in chunk.iter_mut().enumerate() {
            let t = (start + i) as f32 / SAMPLE_RATE as f32;
            *sample = a1 * (2.0 * PI * f1 * t).sin() + a2 * (2.0 * PI * f2 * t).sin();
        }
    }
    wave
}

/// Add white Gaussian noise (Box–Muller) with the given standard deviation
pub fn add_noise(wave: &[f32], sigma: f32, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    wave.iter()
        .map(|&s| {
            let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
            let u2: f32 = rng.gen();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
            s + sigma * z
        })
        .collect()
}

/// Excerpt starting on a hop boundary so query frames line up with the track's
pub fn excerpt(wave: &[f32], start_frame: usize, seconds: f32) -> Vec<f32> {
    let start = start_frame * HOP;
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    wave[start..start + len].to_vec()
}
