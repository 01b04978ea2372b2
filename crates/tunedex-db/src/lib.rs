//! Tunedex Database Layer
//!
//! PostgreSQL storage for fingerprint postings, segment vectors and track metadata

pub mod connection;
pub mod models;
pub mod operations;

// Re-export commonly used types
pub use connection::{connect, create_pool, ConnectOptions, DbPool};
pub use models::{NewPosting, NewTrack, NewTrackIndex, Posting, SegmentRow, Track};
pub use operations::{
    delete_track_index, ensure_schema, get_all_segment_blobs, get_all_tracks,
    get_indexed_track_ids, get_postings_by_track, get_segment_blob, get_tracks_by_ids,
    lookup_postings, replace_track_index, upsert_track,
};
