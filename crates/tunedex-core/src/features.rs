//! Per-segment timbre, harmony and contrast statistics
//!
//! For every STFT frame of a segment three descriptors are computed:
//! MFCCs (mel filterbank, log power, orthonormal DCT-II), a 12-class
//! chroma profile and octave-band spectral contrast. The segment vector is
//! the per-dimension mean and population standard deviation over frames,
//! laid out as
//! `mfcc_mean | mfcc_std | chroma_mean | chroma_std | contrast_mean | contrast_std`.

use crate::config::FeatureConfig;
use crate::error::{MatchError, Result};
use crate::transform::stft_magnitudes;

const POWER_FLOOR: f32 = 1e-10;

/// Triangular mel filter restricted to its non-zero bins
struct MelFilter {
    first_bin: usize,
    weights: Vec<f32>,
}

pub struct FeatureExtractor {
    n_fft: usize,
    hop_length: usize,
    n_mfcc: usize,
    n_chroma: usize,
    mel_filters: Vec<MelFilter>,
    /// DCT-II basis, `n_mfcc` rows of `n_mels` values
    dct: Vec<Vec<f32>>,
    /// Pitch class of every FFT bin (None below the lowest audible pitch)
    chroma_bins: Vec<Option<usize>>,
    /// `[start, end)` bin range of every contrast band
    contrast_bands: Vec<(usize, usize)>,
    contrast_quantile: f32,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32, n_fft: usize, hop_length: usize, config: &FeatureConfig) -> Self {
        let num_bins = n_fft / 2 + 1;
        let bin_hz = sample_rate as f32 / n_fft as f32;

        Self {
            n_fft,
            hop_length,
            n_mfcc: config.n_mfcc,
            n_chroma: config.n_chroma,
            mel_filters: mel_filterbank(config.n_mels, num_bins, bin_hz, sample_rate as f32 / 2.0),
            dct: dct_basis(config.n_mfcc, config.n_mels),
            chroma_bins: chroma_map(num_bins, bin_hz, config.n_chroma),
            contrast_bands: contrast_band_ranges(
                num_bins,
                bin_hz,
                config.contrast_fmin,
                config.contrast_bands,
            ),
            contrast_quantile: config.contrast_quantile,
        }
    }

    /// Output length
    pub fn dimension(&self) -> usize {
        2 * (self.n_mfcc + self.n_chroma + self.contrast_bands.len())
    }

    /// Raw (unnormalised) feature vector of one waveform slice
    pub fn extract(&self, slice: &[f32]) -> Result<Vec<f32>> {
        let frames = stft_magnitudes(slice, self.n_fft, self.hop_length);
        if frames.is_empty() {
            return Err(MatchError::DependencyFailure(format!(
                "slice of {} samples is shorter than one {}-point analysis frame",
                slice.len(),
                self.n_fft
            )));
        }

        let mut mfcc = Vec::with_capacity(frames.len());
        let mut chroma = Vec::with_capacity(frames.len());
        let mut contrast = Vec::with_capacity(frames.len());

        for magnitudes in &frames {
            let power: Vec<f32> = magnitudes.iter().map(|m| m * m).collect();
            mfcc.push(self.frame_mfcc(&power));
            chroma.push(self.frame_chroma(&power));
            contrast.push(self.frame_contrast(magnitudes));
        }

        let mut out = Vec::with_capacity(self.dimension());
        for rows in [&mfcc, &chroma, &contrast] {
            let (mean, std) = mean_and_std(rows);
            out.extend(mean);
            out.extend(std);
        }

        if out.iter().any(|v| !v.is_finite()) {
            return Err(MatchError::DependencyFailure(
                "feature extraction produced non-finite values".into(),
            ));
        }

        Ok(out)
    }

    fn frame_mfcc(&self, power: &[f32]) -> Vec<f32> {
        let log_mel: Vec<f32> = self
            .mel_filters
            .iter()
            .map(|filter| {
                let energy: f32 = filter
                    .weights
                    .iter()
                    .zip(&power[filter.first_bin..])
                    .map(|(w, p)| w * p)
                    .sum();
                10.0 * energy.max(POWER_FLOOR).log10()
            })
            .collect();

        self.dct
            .iter()
            .map(|basis| basis.iter().zip(&log_mel).map(|(b, x)| b * x).sum())
            .collect()
    }

    fn frame_chroma(&self, power: &[f32]) -> Vec<f32> {
        let mut classes = vec![0.0f32; self.n_chroma];
        for (bin, class) in self.chroma_bins.iter().enumerate() {
            if let Some(c) = class {
                classes[*c] += power[bin];
            }
        }

        let peak = classes.iter().copied().fold(0.0f32, f32::max);
        if peak > 0.0 {
            classes.iter_mut().for_each(|v| *v /= peak);
        }
        classes
    }

    fn frame_contrast(&self, magnitudes: &[f32]) -> Vec<f32> {
        self.contrast_bands
            .iter()
            .map(|&(start, end)| {
                if end <= start {
                    return 0.0;
                }
                let mut band: Vec<f32> = magnitudes[start..end].to_vec();
                band.sort_by(|a, b| a.total_cmp(b));

                let alpha = ((self.contrast_quantile * band.len() as f32).round() as usize).max(1);
                let valley = band[..alpha].iter().sum::<f32>() / alpha as f32;
                let peak = band[band.len() - alpha..].iter().sum::<f32>() / alpha as f32;

                10.0 * peak.max(POWER_FLOOR).log10() - 10.0 * valley.max(POWER_FLOOR).log10()
            })
            .collect()
    }
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Area-normalised triangular filters evenly spaced on the mel scale
fn mel_filterbank(n_mels: usize, num_bins: usize, bin_hz: f32, fmax: f32) -> Vec<MelFilter> {
    let mel_max = hz_to_mel(fmax);
    let edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (lo, centre, hi) = (edges[m], edges[m + 1], edges[m + 2]);
            let norm = 2.0 / (hi - lo);

            let weights: Vec<(usize, f32)> = (0..num_bins)
                .filter_map(|k| {
                    let f = k as f32 * bin_hz;
                    let w = if f > lo && f <= centre {
                        (f - lo) / (centre - lo)
                    } else if f > centre && f < hi {
                        (hi - f) / (hi - centre)
                    } else {
                        0.0
                    };
                    (w > 0.0).then_some((k, w * norm))
                })
                .collect();

            match (weights.first(), weights.last()) {
                (Some(&(first, _)), Some(&(last, _))) => {
                    let mut dense = vec![0.0; last - first + 1];
                    for (k, w) in weights {
                        dense[k - first] = w;
                    }
                    MelFilter {
                        first_bin: first,
                        weights: dense,
                    }
                }
                // Narrower than one bin: contributes nothing
                _ => MelFilter {
                    first_bin: 0,
                    weights: Vec::new(),
                },
            }
        })
        .collect()
}

fn dct_basis(n_out: usize, n_in: usize) -> Vec<Vec<f32>> {
    let n = n_in as f32;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| {
                    scale * (std::f32::consts::PI * k as f32 * (2 * i + 1) as f32 / (2.0 * n)).cos()
                })
                .collect()
        })
        .collect()
}

/// Fold FFT bins onto pitch classes (C = 0), ignoring bins below A0
fn chroma_map(num_bins: usize, bin_hz: f32, n_chroma: usize) -> Vec<Option<usize>> {
    const A0_HZ: f32 = 27.5;
    let per_octave = n_chroma as f32;

    (0..num_bins)
        .map(|k| {
            let f = k as f32 * bin_hz;
            if f < A0_HZ {
                return None;
            }
            // steps above A4, shifted so C is class 0
            let steps = (per_octave * (f / 440.0).log2()).round() as i64;
            let offset = (9.0 * per_octave / 12.0).round() as i64;
            Some((steps + offset).rem_euclid(n_chroma as i64) as usize)
        })
        .collect()
}

/// Octave bands: `[0, fmin)`, `[fmin, 2 fmin)`, ..., the last extended to Nyquist
fn contrast_band_ranges(num_bins: usize, bin_hz: f32, fmin: f32, n_bands: usize) -> Vec<(usize, usize)> {
    let bin_of = |hz: f32| ((hz / bin_hz).ceil() as usize).min(num_bins);

    let mut edges = vec![0usize];
    edges.extend((0..n_bands).map(|i| bin_of(fmin * 2f32.powi(i as i32))));
    edges.push(num_bins);

    edges.windows(2).map(|w| (w[0], w[1])).collect()
}

fn mean_and_std(rows: &[Vec<f32>]) -> (Vec<f32>, Vec<f32>) {
    let dim = rows.first().map(|r| r.len()).unwrap_or(0);
    let n = rows.len() as f64;

    let mut mean = vec![0.0f64; dim];
    for row in rows {
        for (acc, &v) in mean.iter_mut().zip(row) {
            *acc += v as f64;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut var = vec![0.0f64; dim];
    for row in rows {
        for ((acc, &v), &m) in var.iter_mut().zip(row).zip(&mean) {
            let d = v as f64 - m;
            *acc += d * d;
        }
    }

    (
        mean.iter().map(|&m| m as f32).collect(),
        var.iter().map(|&v| (v / n).sqrt() as f32).collect(),
    )
}
