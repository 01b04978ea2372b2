//! Tunedex persisted formats
//!
//! Byte layouts shared by every storage backend: the flat `f32` segment-vector
//! blob and the single-file catalog snapshot used by the filesystem backend.

pub mod blob;
pub mod format;
pub mod reader;
pub mod writer;

pub use blob::{decode_vectors, encode_vectors, BlobError};
pub use format::{
    CatalogSnapshot, MetadataRecord, PostingRecord, SnapshotError, SnapshotHeader, TrackRecord,
    HEADER_SIZE, MAGIC, VERSION,
};
pub use reader::SnapshotReader;
pub use writer::SnapshotWriter;
