//! Catalog snapshot file structures

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Magic bytes for snapshot files: "TDXC"
pub const MAGIC: [u8; 4] = [0x54, 0x44, 0x58, 0x43];

/// Current format version
pub const VERSION: u16 = 1;

/// Encoded header size in bytes
pub const HEADER_SIZE: usize = 48;

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid snapshot: magic bytes mismatch")]
    BadMagic,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u16),

    #[error("snapshot truncated: expected {expected} bytes, found {actual}")]
    Truncated { expected: u64, actual: u64 },

    #[error("snapshot checksum mismatch: header {expected:#018x}, payload {actual:#018x}")]
    ChecksumMismatch { expected: u64, actual: u64 },

    #[error("snapshot payload: {0}")]
    Payload(#[from] bincode::Error),
}

/// File header (48 bytes fixed size, little-endian)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Magic bytes: "TDXC"
    pub magic: [u8; 4],
    /// Format version
    pub version: u16,
    /// Flags (bit 0: compressed)
    pub flags: u16,
    /// Size of the bincode payload (uncompressed)
    pub payload_size: u64,
    /// Size of the payload as stored on disk
    pub stored_size: u64,
    /// Number of tracks with index entries
    pub num_tracks: u64,
    /// Total postings across all tracks
    pub num_postings: u64,
    /// CRC-64 of the stored payload bytes
    pub checksum: u64,
}

impl SnapshotHeader {
    pub fn new(payload_size: u64, stored_size: u64, num_tracks: u64, num_postings: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            payload_size,
            stored_size,
            num_tracks,
            num_postings,
            checksum: 0,
        }
    }

    pub fn is_compressed(&self) -> bool {
        (self.flags & 0x1) != 0
    }

    pub fn set_compressed(&mut self, compressed: bool) {
        if compressed {
            self.flags |= 0x1;
        } else {
            self.flags &= !0x1;
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.magic);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out[6..8].copy_from_slice(&self.flags.to_le_bytes());
        out[8..16].copy_from_slice(&self.payload_size.to_le_bytes());
        out[16..24].copy_from_slice(&self.stored_size.to_le_bytes());
        out[24..32].copy_from_slice(&self.num_tracks.to_le_bytes());
        out[32..40].copy_from_slice(&self.num_postings.to_le_bytes());
        out[40..48].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        if bytes.len() < HEADER_SIZE {
            return Err(SnapshotError::Truncated {
                expected: HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        if magic != MAGIC {
            return Err(SnapshotError::BadMagic);
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u64_at = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(buf)
        };

        let version = u16_at(4);
        if version != VERSION {
            return Err(SnapshotError::UnsupportedVersion(version));
        }

        Ok(Self {
            magic,
            version,
            flags: u16_at(6),
            payload_size: u64_at(8),
            stored_size: u64_at(16),
            num_tracks: u64_at(24),
            num_postings: u64_at(32),
            checksum: u64_at(40),
        })
    }
}

/// One fingerprint posting of a track: the hash key and the anchor frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingRecord {
    pub hash: u64,
    pub anchor_time: u32,
}

/// Everything indexed for one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub track_id: i64,
    pub postings: Vec<PostingRecord>,
    /// Segment vectors in the blob layout of [`crate::blob`]
    pub segment_blob: Vec<u8>,
}

/// Descriptive fields owned by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub track_id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_s: Option<f64>,
    pub image: Option<String>,
}

/// Payload of a snapshot file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// RFC 3339 creation time
    pub created_at: String,
    /// Feature dimension the segment blobs were written with
    pub feature_dim: u32,
    pub tracks: Vec<TrackRecord>,
    pub metadata: Vec<MetadataRecord>,
}

impl CatalogSnapshot {
    pub fn new(feature_dim: u32) -> Self {
        Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            feature_dim,
            tracks: Vec::new(),
            metadata: Vec::new(),
        }
    }

    pub fn num_postings(&self) -> u64 {
        self.tracks.iter().map(|t| t.postings.len() as u64).sum()
    }
}
