//! Error taxonomy
//!
//! "No match" and unknown metadata ids are ordinary results, not errors:
//! see [`crate::matching::IdentifyOutcome`].

use thiserror::Error;
use tunedex_format::{BlobError, SnapshotError};

use crate::TrackId;

pub type Result<T, E = MatchError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum MatchError {
    /// Caller supplied something unusable: short waveform, empty seed list,
    /// unknown track for a similarity lookup.
    #[error("invalid input: {0}")]
    Input(String),

    #[error("track {0} is not indexed")]
    UnknownTrack(TrackId),

    #[error("index corruption: {0}")]
    IndexCorruption(String),

    /// Decode, transcode or feature-extraction capability failed.
    #[error("dependency failure: {0}")]
    DependencyFailure(String),

    #[error("similarity scan exceeded its {deadline_ms} ms deadline")]
    DeadlineExceeded { deadline_ms: u64 },

    #[error("configuration: {0}")]
    Config(String),

    #[error("storage: {0:#}")]
    Storage(anyhow::Error),
}

impl MatchError {
    pub fn input(msg: impl Into<String>) -> Self {
        MatchError::Input(msg.into())
    }

    /// Whether this error was caused by the caller's request rather than the system
    pub fn is_input(&self) -> bool {
        matches!(self, MatchError::Input(_) | MatchError::UnknownTrack(_))
    }
}

/// Failures reported by a [`crate::storage_backend::TrackStore`]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("corrupt segment vectors for track {track_id}: {source}")]
    CorruptBlob {
        track_id: TrackId,
        #[source]
        source: BlobError,
    },

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(#[from] SnapshotError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for MatchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CorruptBlob { .. } | StoreError::CorruptSnapshot(_) => {
                MatchError::IndexCorruption(err.to_string())
            }
            StoreError::Backend(e) => MatchError::Storage(e),
        }
    }
}

impl From<tokio::task::JoinError> for MatchError {
    fn from(err: tokio::task::JoinError) -> Self {
        MatchError::DependencyFailure(format!("worker task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_blob_maps_to_index_corruption() {
        let err: MatchError = StoreError::CorruptBlob {
            track_id: 4,
            source: BlobError::LengthMismatch { floats: 67, dim: 68 },
        }
        .into();
        assert!(matches!(err, MatchError::IndexCorruption(ref msg) if msg.contains("track 4")));
    }

    #[test]
    fn test_backend_failure_maps_to_storage() {
        let err: MatchError = StoreError::Backend(anyhow::anyhow!("connection refused")).into();
        assert!(matches!(err, MatchError::Storage(_)));
        assert!(!err.is_input());
    }
}
