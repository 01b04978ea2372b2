//! Signal front end
//!
//! Everything that turns a waveform into numbers sits behind
//! [`SignalFrontEnd`]: the log-magnitude spectrogram used for peak picking
//! and the raw per-segment feature vector used for similarity.

use crate::config::{MatchConfig, SpectrogramConfig};
use crate::error::{MatchError, Result};
use crate::features::FeatureExtractor;
use crate::transform::{compute_spectrogram, Spectrogram};

pub trait SignalFrontEnd: Send + Sync {
    /// dB spectrogram of a mono waveform at the configured rate
    fn spectrogram(&self, waveform: &[f32]) -> Result<Spectrogram>;

    /// Raw (unnormalised) feature vector of one segment
    fn segment_features(&self, slice: &[f32]) -> Result<Vec<f32>>;

    /// Length of vectors returned by [`segment_features`](Self::segment_features)
    fn feature_dimension(&self) -> usize;
}

/// STFT-based front end driven by [`MatchConfig`]
pub struct StftFrontEnd {
    spectrogram: SpectrogramConfig,
    features: FeatureExtractor,
}

impl StftFrontEnd {
    pub fn new(config: MatchConfig) -> Self {
        let features = FeatureExtractor::new(
            config.sample_rate,
            config.spectrogram.n_fft,
            config.spectrogram.hop_length,
            &config.features,
        );
        Self {
            spectrogram: config.spectrogram,
            features,
        }
    }
}

impl SignalFrontEnd for StftFrontEnd {
    fn spectrogram(&self, waveform: &[f32]) -> Result<Spectrogram> {
        if waveform.iter().any(|s| !s.is_finite()) {
            return Err(MatchError::input("waveform contains non-finite samples"));
        }
        Ok(compute_spectrogram(waveform, &self.spectrogram))
    }

    fn segment_features(&self, slice: &[f32]) -> Result<Vec<f32>> {
        self.features.extract(slice)
    }

    fn feature_dimension(&self) -> usize {
        self.features.dimension()
    }
}
