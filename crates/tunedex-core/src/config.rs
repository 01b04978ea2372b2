//! Configuration parameters for fingerprinting and similarity
//!
//! Every algorithm constant lives here. Changing any of the spectrogram,
//! peak or hashing values invalidates a persisted fingerprint index.

use serde::{Deserialize, Serialize};

use crate::error::{MatchError, Result};

/// Dimension of one normalised segment vector
pub const FEATURE_DIM: usize = 68;

/// Largest Δt representable in a fingerprint hash
pub const MAX_HASH_DT: u32 = (1 << 16) - 1;

/// Largest frequency bin representable in a fingerprint hash
pub const MAX_HASH_BIN: u32 = (1 << 24) - 1;

/// Algorithm configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Rate every waveform is expected at (Hz)
    pub sample_rate: u32,
    pub spectrogram: SpectrogramConfig,
    pub peaks: PeakConfig,
    pub hashing: HashConfig,
    pub segments: SegmentConfig,
    pub features: FeatureConfig,
    pub similarity: SimilarityConfig,
    pub identify: IdentifyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Dynamic range kept below the loudest bin (dB)
    pub top_db: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Side of the square neighbourhood, in bins and frames
    pub window_size: usize,
    /// A peak must be strictly louder than this (dB)
    pub amplitude_threshold: f32,
    /// Value assumed outside the spectrogram edges (dB)
    pub boundary_value: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    pub fan_out: usize,
    pub dt_min: u32,
    pub dt_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub seg_duration_s: f64,
    pub hop_duration_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub n_mfcc: usize,
    pub n_mels: usize,
    pub n_chroma: usize,
    /// Octave bands above `contrast_fmin`; one extra band covers 0..fmin
    pub contrast_bands: usize,
    pub contrast_fmin: f32,
    pub contrast_quantile: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Number of best segment pairs averaged into a pair score
    pub top_k: usize,
    /// Abort a catalog scan after this many milliseconds
    pub scan_deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifyConfig {
    /// Winning vote counts below this are reported as no match
    pub min_matches: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            spectrogram: SpectrogramConfig::default(),
            peaks: PeakConfig::default(),
            hashing: HashConfig::default(),
            segments: SegmentConfig::default(),
            features: FeatureConfig::default(),
            similarity: SimilarityConfig::default(),
            identify: IdentifyConfig::default(),
        }
    }
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            top_db: 80.0,
        }
    }
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            window_size: 20,
            amplitude_threshold: -40.0,
            boundary_value: 0.0,
        }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            fan_out: 15,
            dt_min: 0,
            dt_max: 200,
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            seg_duration_s: 3.0,
            hop_duration_s: 1.5,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 15,
            n_mels: 40,
            n_chroma: 12,
            contrast_bands: 6,
            contrast_fmin: 150.0,
            contrast_quantile: 0.02,
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            top_k: 10,
            scan_deadline_ms: None,
        }
    }
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self { min_matches: 1 }
    }
}

impl FeatureConfig {
    /// Length of the raw feature vector: mean and std of every statistic
    pub fn dimension(&self) -> usize {
        2 * (self.n_mfcc + self.n_chroma + self.contrast_bands + 1)
    }
}

impl SegmentConfig {
    /// Segment length and hop in samples
    pub fn lengths(&self, sample_rate: u32) -> (usize, usize) {
        let seg = (self.seg_duration_s * sample_rate as f64) as usize;
        let hop = (self.hop_duration_s * sample_rate as f64) as usize;
        (seg, hop)
    }
}

impl MatchConfig {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(MatchError::Config(msg));

        if self.sample_rate == 0 {
            return fail("sample_rate must be > 0".into());
        }
        if self.spectrogram.n_fft < 2 || self.spectrogram.hop_length == 0 {
            return fail("n_fft must be >= 2 and hop_length > 0".into());
        }
        if self.spectrogram.top_db <= 0.0 {
            return fail("top_db must be > 0".into());
        }
        let num_bins = self.spectrogram.n_fft / 2 + 1;
        if num_bins as u64 > MAX_HASH_BIN as u64 {
            return fail(format!("{} frequency bins do not fit a fingerprint hash", num_bins));
        }
        if self.peaks.window_size == 0 {
            return fail("peak window_size must be > 0".into());
        }
        if self.hashing.dt_min > self.hashing.dt_max {
            return fail("dt_min must be <= dt_max".into());
        }
        if self.hashing.dt_max > MAX_HASH_DT {
            return fail(format!("dt_max must be <= {}", MAX_HASH_DT));
        }
        if self.segments.seg_duration_s <= 0.0 || self.segments.hop_duration_s <= 0.0 {
            return fail("segment and hop durations must be > 0".into());
        }
        let (seg_len, hop_len) = self.segments.lengths(self.sample_rate);
        if seg_len < self.spectrogram.n_fft || hop_len == 0 {
            return fail("a segment must span at least one STFT frame".into());
        }

        let f = &self.features;
        if f.n_mfcc == 0 || f.n_mfcc > f.n_mels || f.n_chroma == 0 {
            return fail("need 0 < n_mfcc <= n_mels and n_chroma > 0".into());
        }
        if !(f.contrast_quantile > 0.0 && f.contrast_quantile < 0.5) {
            return fail("contrast_quantile must be in (0, 0.5)".into());
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if f.contrast_fmin <= 0.0 || f.contrast_fmin * 2f32.powi(f.contrast_bands as i32) >= nyquist {
            return fail(format!(
                "contrast bands from {} Hz x 2^{} exceed the Nyquist frequency {} Hz",
                f.contrast_fmin, f.contrast_bands, nyquist
            ));
        }
        if f.dimension() != FEATURE_DIM {
            return fail(format!(
                "feature dimension is {}, expected {}",
                f.dimension(),
                FEATURE_DIM
            ));
        }

        if self.similarity.top_k == 0 {
            return fail("similarity top_k must be > 0".into());
        }

        Ok(())
    }

    /// Seconds covered by one spectrogram hop
    pub fn frame_seconds(&self) -> f64 {
        self.spectrogram.hop_length as f64 / self.sample_rate as f64
    }
}
