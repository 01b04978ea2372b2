//! Peak extraction using 2D max filtering
//!
//! A bin is a peak when it equals the maximum of the `window × window`
//! neighbourhood around it and is louder than the amplitude threshold.
//! Positions outside the spectrogram count as `boundary_value`.

use crate::config::PeakConfig;
use crate::transform::Spectrogram;
use serde::{Deserialize, Serialize};

/// A salient time-frequency point of a spectrogram
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    /// Frequency bin index
    pub frequency_bin: u32,
    /// Time index (frame number)
    pub time_bin: u32,
    /// Level in dB
    pub amplitude: f32,
}

impl Peak {
    pub fn new(frequency_bin: u32, time_bin: u32, amplitude: f32) -> Self {
        Self {
            frequency_bin,
            time_bin,
            amplitude,
        }
    }
}

/// Peak extractor
pub struct PeakExtractor {
    window_size: usize,
    amplitude_threshold: f32,
    boundary_value: f32,
}

impl PeakExtractor {
    pub fn new(config: &PeakConfig) -> Self {
        Self {
            window_size: config.window_size,
            amplitude_threshold: config.amplitude_threshold,
            boundary_value: config.boundary_value,
        }
    }

    /// Extract every qualifying peak. Equal maxima within one neighbourhood
    /// are all reported. Output is in frame-major scan order.
    pub fn extract(&self, spectrogram: &Spectrogram) -> Vec<Peak> {
        if spectrogram.num_frames == 0 || spectrogram.num_bins == 0 {
            return Vec::new();
        }

        let max_filtered = self.apply_2d_max_filter(spectrogram);

        let mut peaks = Vec::new();
        for t in 0..spectrogram.num_frames {
            for f in 0..spectrogram.num_bins {
                let value = spectrogram.magnitudes[t][f];
                if value == max_filtered[t][f] && value > self.amplitude_threshold {
                    peaks.push(Peak::new(f as u32, t as u32, value));
                }
            }
        }

        log::trace!(
            "Extracted {} peaks from {} frames x {} bins",
            peaks.len(),
            spectrogram.num_frames,
            spectrogram.num_bins
        );

        peaks
    }

    /// Separable box maximum: frequency pass, then time pass
    fn apply_2d_max_filter(&self, spectrogram: &Spectrogram) -> Vec<Vec<f32>> {
        let num_frames = spectrogram.num_frames;
        let num_bins = spectrogram.num_bins;

        let freq_filtered: Vec<Vec<f32>> = spectrogram
            .magnitudes
            .iter()
            .map(|frame| self.sliding_max(num_bins, |f| frame[f]))
            .collect();

        let mut time_filtered = vec![vec![0.0; num_bins]; num_frames];
        for f in 0..num_bins {
            let column = self.sliding_max(num_frames, |t| freq_filtered[t][f]);
            for (t, v) in column.into_iter().enumerate() {
                time_filtered[t][f] = v;
            }
        }

        time_filtered
    }

    /// Maximum over `[i - w/2, i + (w - 1 - w/2)]` for every `i < len`
    fn sliding_max(&self, len: usize, value_at: impl Fn(usize) -> f32) -> Vec<f32> {
        let before = self.window_size / 2;
        let after = self.window_size - 1 - before;

        (0..len)
            .map(|i| {
                let lo = i.checked_sub(before);
                let hi = i + after;

                let start = lo.unwrap_or(0);
                let end = hi.min(len - 1);
                let inner = (start..=end).map(&value_at).fold(f32::NEG_INFINITY, f32::max);

                if lo.is_none() || hi >= len {
                    inner.max(self.boundary_value)
                } else {
                    inner
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(window_size: usize, threshold: f32) -> PeakExtractor {
        PeakExtractor::new(&PeakConfig {
            window_size,
            amplitude_threshold: threshold,
            boundary_value: -100.0,
        })
    }

    fn flat(frames: usize, bins: usize, value: f32) -> Vec<Vec<f32>> {
        vec![vec![value; bins]; frames]
    }

    #[test]
    fn test_single_peak() {
        let mut m = flat(10, 10, -60.0);
        m[4][6] = -5.0;
        let peaks = extractor(3, -40.0).extract(&Spectrogram::from_frames(m, 10));

        assert_eq!(peaks, vec![Peak::new(6, 4, -5.0)]);
    }

    #[test]
    fn test_below_threshold_is_not_a_peak() {
        let mut m = flat(10, 10, -60.0);
        m[4][6] = -45.0;
        let peaks = extractor(3, -40.0).extract(&Spectrogram::from_frames(m, 10));
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut m = flat(10, 10, -60.0);
        m[4][6] = -40.0;
        let peaks = extractor(3, -40.0).extract(&Spectrogram::from_frames(m, 10));
        assert!(peaks.is_empty());
    }

    #[test]
    fn test_ties_are_all_reported() {
        let mut m = flat(10, 10, -60.0);
        m[4][4] = -3.0;
        m[4][5] = -3.0;
        let peaks = extractor(3, -40.0).extract(&Spectrogram::from_frames(m, 10));
        assert_eq!(peaks.len(), 2);
    }

    #[test]
    fn test_neighbourhood_suppresses_smaller_maximum() {
        let mut m = flat(20, 20, -60.0);
        m[5][5] = -3.0;
        m[7][7] = -10.0; // inside the 5x5 neighbourhood of the louder bin
        m[15][15] = -10.0; // far away, survives
        let peaks = extractor(5, -40.0).extract(&Spectrogram::from_frames(m, 20));

        assert_eq!(peaks.len(), 2);
        assert!(peaks.contains(&Peak::new(5, 5, -3.0)));
        assert!(peaks.contains(&Peak::new(15, 15, -10.0)));
    }

    #[test]
    fn test_boundary_value_blocks_edge_peaks() {
        let mut m = flat(10, 10, -60.0);
        m[0][0] = -5.0;
        let spec = Spectrogram::from_frames(m, 10);

        // Boundary quieter than the bin: edge peak survives.
        assert_eq!(extractor(3, -40.0).extract(&spec).len(), 1);

        // Boundary louder than the bin: suppressed, no wrap-around.
        let loud_edge = PeakExtractor::new(&PeakConfig {
            window_size: 3,
            amplitude_threshold: -40.0,
            boundary_value: 0.0,
        });
        assert!(loud_edge.extract(&spec).is_empty());
    }

    #[test]
    fn test_even_window_is_asymmetric() {
        // Window 4 covers [i-2, i+1]: a louder bin two frames later does not
        // suppress bin i, one two frames earlier does.
        let mut m = flat(8, 1, -60.0);
        m[2][0] = -10.0;
        m[4][0] = -5.0;
        let peaks = extractor(4, -40.0).extract(&Spectrogram::from_frames(m, 1));
        assert_eq!(peaks.len(), 2);

        let mut m = flat(8, 1, -60.0);
        m[2][0] = -5.0;
        m[4][0] = -10.0;
        let peaks = extractor(4, -40.0).extract(&Spectrogram::from_frames(m, 1));
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].time_bin, 2);
    }

    #[test]
    fn test_deterministic() {
        let m: Vec<Vec<f32>> = (0..30)
            .map(|t| (0..30).map(|f| -(((t * 7 + f * 13) % 50) as f32)).collect())
            .collect();
        let spec = Spectrogram::from_frames(m, 30);
        let e = extractor(4, -45.0);
        assert_eq!(e.extract(&spec), e.extract(&spec));
    }
}
