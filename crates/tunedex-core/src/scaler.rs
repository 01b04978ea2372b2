//! Pretrained affine feature scaler
//!
//! Standardisation parameters fitted offline: `y = (x - mean) / scale`.
//! Loaded once at startup, never fitted here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MatchError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineScaler {
    pub mean: Vec<f32>,
    pub scale: Vec<f32>,
}

impl AffineScaler {
    pub fn new(mean: Vec<f32>, scale: Vec<f32>) -> Result<Self> {
        if mean.len() != scale.len() || mean.is_empty() {
            return Err(MatchError::Config(format!(
                "scaler mean ({}) and scale ({}) must have the same non-zero length",
                mean.len(),
                scale.len()
            )));
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            return Err(MatchError::Config("scaler parameters must be finite".into()));
        }
        Ok(Self { mean, scale })
    }

    /// Pass-through scaler
    pub fn identity(dim: usize) -> Self {
        Self {
            mean: vec![0.0; dim],
            scale: vec![1.0; dim],
        }
    }

    /// Load a scaler from a JSON file `{"mean": [...], "scale": [...]}`
    pub fn load(path: &Path, expected_dim: usize) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MatchError::Config(format!("Failed to read scaler {}: {}", path.display(), e))
        })?;
        let raw: AffineScaler = serde_json::from_str(&content).map_err(|e| {
            MatchError::Config(format!("Failed to parse scaler {}: {}", path.display(), e))
        })?;
        let scaler = Self::new(raw.mean, raw.scale)?;

        if scaler.dimension() != expected_dim {
            return Err(MatchError::Config(format!(
                "scaler {} has dimension {}, feature extractor produces {}",
                path.display(),
                scaler.dimension(),
                expected_dim
            )));
        }

        Ok(scaler)
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    /// Normalise one raw feature vector
    pub fn transform(&self, raw: &[f32]) -> Result<Vec<f32>> {
        if raw.len() != self.dimension() {
            return Err(MatchError::input(format!(
                "feature vector has {} values, scaler expects {}",
                raw.len(),
                self.dimension()
            )));
        }

        Ok(raw
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&m, &s))| {
                // constant features were fitted with zero variance
                let s = if s == 0.0 { 1.0 } else { s };
                (x - m) / s
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_transform() {
        let scaler = AffineScaler::new(vec![1.0, 2.0, 3.0], vec![2.0, 0.5, 0.0]).unwrap();
        assert_eq!(scaler.transform(&[3.0, 2.5, 4.0]).unwrap(), vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_identity() {
        let scaler = AffineScaler::identity(4);
        assert_eq!(scaler.transform(&[1.0, -2.0, 3.5, 0.0]).unwrap(), vec![1.0, -2.0, 3.5, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let scaler = AffineScaler::identity(4);
        assert!(matches!(scaler.transform(&[1.0]), Err(MatchError::Input(_))));
        assert!(AffineScaler::new(vec![0.0; 2], vec![1.0; 3]).is_err());
    }

    #[test]
    fn test_load_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mean": [0.5, 1.5], "scale": [1.0, 2.0]}}"#).unwrap();

        let scaler = AffineScaler::load(file.path(), 2).unwrap();
        assert_eq!(scaler.mean, vec![0.5, 1.5]);

        assert!(matches!(
            AffineScaler::load(file.path(), 68),
            Err(MatchError::Config(_))
        ));
    }
}
