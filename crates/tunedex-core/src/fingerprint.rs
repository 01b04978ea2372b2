//! Fingerprint generation and hashing
//!
//! Each anchor peak is paired with up to `fan_out` later peaks. A pair
//! `(f1, f2, Δt)` is packed into a 64-bit key:
//!
//! ```text
//!  63            40 39            16 15        0
//! +----------------+----------------+-----------+
//! |  f1 (24 bits)  |  f2 (24 bits)  | Δt (16 b) |
//! +----------------+----------------+-----------+
//! ```
//!
//! The key is stored in persisted indexes and must never change between
//! versions or platforms.

use crate::config::HashConfig;
use crate::peaks::Peak;
use serde::{Deserialize, Serialize};

/// A fingerprint hash and the time of the anchor it was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: u64,
    /// Time index of the anchor peak
    pub anchor_time: u32,
}

/// Pack an anchor/target pair into its hash key
pub fn hash_pair(f1: u32, f2: u32, dt: u32) -> u64 {
    ((f1 as u64 & 0xFF_FFFF) << 40) | ((f2 as u64 & 0xFF_FFFF) << 16) | (dt as u64 & 0xFFFF)
}

/// Recover `(f1, f2, Δt)` from a hash key
pub fn unpack_hash(hash: u64) -> (u32, u32, u32) {
    (
        ((hash >> 40) & 0xFF_FFFF) as u32,
        ((hash >> 16) & 0xFF_FFFF) as u32,
        (hash & 0xFFFF) as u32,
    )
}

/// Fingerprint generator
pub struct FingerprintHasher {
    fan_out: usize,
    dt_min: u32,
    dt_max: u32,
}

impl FingerprintHasher {
    pub fn new(config: &HashConfig) -> Self {
        Self {
            fan_out: config.fan_out,
            dt_min: config.dt_min,
            dt_max: config.dt_max,
        }
    }

    /// Generate fingerprints from an unordered peak set
    pub fn generate(&self, peaks: &[Peak]) -> Vec<Fingerprint> {
        let mut sorted: Vec<&Peak> = peaks.iter().collect();
        sorted.sort_by_key(|p| (p.time_bin, p.frequency_bin));

        let mut fingerprints = Vec::with_capacity(sorted.len() * self.fan_out);

        for (i, anchor) in sorted.iter().enumerate() {
            for target in sorted.iter().skip(i + 1).take(self.fan_out) {
                let dt = target.time_bin - anchor.time_bin;

                if dt < self.dt_min {
                    continue;
                }
                if dt > self.dt_max {
                    // Targets are time-ordered, later ones are further away.
                    break;
                }

                fingerprints.push(Fingerprint {
                    hash: hash_pair(anchor.frequency_bin, target.frequency_bin, dt),
                    anchor_time: anchor.time_bin,
                });
            }
        }

        fingerprints
    }
}
