//! Snapshot file writer

use crate::format::{CatalogSnapshot, SnapshotError, SnapshotHeader};
use crc::{Crc, CRC_64_ECMA_182};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub(crate) const CHECKSUM: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

const ZSTD_LEVEL: i32 = 3;

pub struct SnapshotWriter {
    compress: bool,
}

impl SnapshotWriter {
    pub fn new(compress: bool) -> Self {
        Self { compress }
    }

    /// Write the snapshot to `path` and fsync it.
    ///
    /// The file is written in place; callers that need atomic replacement
    /// write to a sibling path and rename.
    pub fn write(&self, path: &Path, snapshot: &CatalogSnapshot) -> Result<SnapshotHeader, SnapshotError> {
        let payload = bincode::serialize(snapshot)?;
        let stored = if self.compress {
            zstd::encode_all(&payload[..], ZSTD_LEVEL)?
        } else {
            payload.clone()
        };

        let mut header = SnapshotHeader::new(
            payload.len() as u64,
            stored.len() as u64,
            snapshot.tracks.len() as u64,
            snapshot.num_postings(),
        );
        header.set_compressed(self.compress);
        header.checksum = CHECKSUM.checksum(&stored);

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.to_bytes())?;
        writer.write_all(&stored)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        Ok(header)
    }
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        Self::new(true)
    }
}
