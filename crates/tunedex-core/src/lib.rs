//! Tunedex Core - audio identification and similarity
//!
//! Two engines share one ingestion pipeline: landmark fingerprints with
//! offset voting identify a track from an excerpt, and bags of per-segment
//! feature vectors rank catalog tracks by acoustic similarity.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod fingerprint;
pub mod frontend;
pub mod matching;
pub mod peaks;
pub mod scaler;
pub mod segmentation;
pub mod similarity;
pub mod storage_backend;
pub mod storage_config;
pub mod transform;

#[cfg(test)]
mod test_signals;

/// Caller-assigned track identifier
pub type TrackId = i64;

pub use catalog::{TrackEntry, TrackMetadata};
pub use config::{MatchConfig, FEATURE_DIM};
pub use engine::{DescribedTrack, Engine, IngestSummary};
pub use error::{MatchError, Result, StoreError};
pub use fingerprint::{Fingerprint, FingerprintHasher};
pub use frontend::{SignalFrontEnd, StftFrontEnd};
pub use matching::{Identification, IdentifyOutcome, Posting};
pub use peaks::{Peak, PeakExtractor};
pub use scaler::AffineScaler;
pub use segmentation::{segment_audio, AudioSegment};
pub use similarity::{SegmentBag, SimilarTrack};
pub use storage_backend::{open_store, FilesystemStore, MemoryStore, PostgresqlStore, TrackStore};
pub use storage_config::TunedexConfig;
