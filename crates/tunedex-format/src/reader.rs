//! Snapshot file reader

use crate::format::{CatalogSnapshot, SnapshotError, SnapshotHeader, HEADER_SIZE};
use crate::writer::CHECKSUM;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

pub struct SnapshotReader;

impl SnapshotReader {
    /// Read and verify a snapshot file
    pub fn read(path: &Path) -> Result<CatalogSnapshot, SnapshotError> {
        let file = File::open(path)?;
        // SAFETY: snapshot files are only ever replaced by rename, never
        // truncated or rewritten in place while mapped.
        let map = unsafe { Mmap::map(&file)? };
        Self::parse(&map)
    }

    /// Parse a snapshot already held in memory
    pub fn parse(bytes: &[u8]) -> Result<CatalogSnapshot, SnapshotError> {
        let header = SnapshotHeader::from_bytes(bytes)?;

        // the header is outside the checksum, so its sizes are untrusted
        let truncated = SnapshotError::Truncated {
            expected: header.stored_size.saturating_add(HEADER_SIZE as u64),
            actual: bytes.len() as u64,
        };
        let end = match usize::try_from(header.stored_size)
            .ok()
            .and_then(|stored| stored.checked_add(HEADER_SIZE))
        {
            Some(end) if end <= bytes.len() => end,
            _ => return Err(truncated),
        };
        if usize::try_from(header.payload_size).is_err() {
            return Err(truncated);
        }

        let stored = &bytes[HEADER_SIZE..end];
        let actual = CHECKSUM.checksum(stored);
        if actual != header.checksum {
            return Err(SnapshotError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }

        let snapshot = if header.is_compressed() {
            let payload = zstd::decode_all(stored)?;
            if payload.len() as u64 != header.payload_size {
                return Err(SnapshotError::Truncated {
                    expected: header.payload_size,
                    actual: payload.len() as u64,
                });
            }
            bincode::deserialize(&payload)?
        } else {
            bincode::deserialize(stored)?
        };

        Ok(snapshot)
    }
}
