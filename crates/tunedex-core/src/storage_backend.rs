//! Storage backend trait and implementations
//!
//! A [`TrackStore`] holds the inverted fingerprint index, the segment bags
//! and track metadata. Replacing a track is atomic: a reader sees either the
//! old postings and segments or the new ones, never a mix. Every completed
//! write is visible to the next read on the same store.

use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use tunedex_format::{
    decode_vectors, encode_vectors, SnapshotError, SnapshotReader, SnapshotWriter,
};

use crate::catalog::{Catalog, TrackEntry, TrackMetadata};
use crate::error::StoreError;
use crate::fingerprint::Fingerprint;
use crate::matching::Posting;
use crate::similarity::SegmentBag;
use crate::storage_config::{FilesystemConfig, PostgresqlConfig, StorageBackend, StorageConfig};
use crate::TrackId;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Abstract storage backend trait
#[async_trait]
pub trait TrackStore: Send + Sync {
    /// Atomically replace every posting and segment vector of one track
    async fn replace_track(&self, entry: &TrackEntry) -> StoreResult<()>;

    /// Drop a track's postings and segments. Returns whether it was indexed.
    async fn remove_track(&self, track_id: TrackId) -> StoreResult<bool>;

    /// Postings of the given hashes
    async fn lookup_postings(&self, hashes: &[u64]) -> StoreResult<Vec<Posting>>;

    async fn load_segment_bag(&self, track_id: TrackId) -> StoreResult<Option<Arc<SegmentBag>>>;

    /// Every indexed segment bag, by ascending track id
    async fn load_segment_bags(&self) -> StoreResult<Vec<(TrackId, Arc<SegmentBag>)>>;

    async fn track_ids(&self) -> StoreResult<Vec<TrackId>>;

    /// Everything indexed for one track, for export to another store
    async fn load_track(&self, track_id: TrackId) -> StoreResult<Option<TrackEntry>>;

    async fn put_metadata(&self, metadata: &TrackMetadata) -> StoreResult<()>;

    /// Metadata of the given ids; ids without metadata are omitted
    async fn get_metadata(&self, ids: &[TrackId]) -> StoreResult<Vec<TrackMetadata>>;

    async fn list_metadata(&self) -> StoreResult<Vec<TrackMetadata>>;
}

/// Open the backend selected by `config`
pub async fn open_store(config: &StorageConfig, feature_dim: usize) -> StoreResult<Arc<dyn TrackStore>> {
    let store: Arc<dyn TrackStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Filesystem => Arc::new(FilesystemStore::open(&config.filesystem, feature_dim)?),
        StorageBackend::Postgresql => {
            Arc::new(PostgresqlStore::new(&config.postgresql, feature_dim).await?)
        }
    };
    Ok(store)
}

/// Volatile in-process store
#[derive(Default)]
pub struct MemoryStore {
    catalog: RwLock<Catalog>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackStore for MemoryStore {
    async fn replace_track(&self, entry: &TrackEntry) -> StoreResult<()> {
        self.catalog.write().await.replace(entry.clone());
        Ok(())
    }

    async fn remove_track(&self, track_id: TrackId) -> StoreResult<bool> {
        Ok(self.catalog.write().await.remove(track_id).is_some())
    }

    async fn lookup_postings(&self, hashes: &[u64]) -> StoreResult<Vec<Posting>> {
        Ok(self.catalog.read().await.lookup(hashes))
    }

    async fn load_segment_bag(&self, track_id: TrackId) -> StoreResult<Option<Arc<SegmentBag>>> {
        Ok(self.catalog.read().await.segment_bag(track_id))
    }

    async fn load_segment_bags(&self) -> StoreResult<Vec<(TrackId, Arc<SegmentBag>)>> {
        Ok(self.catalog.read().await.segment_bags())
    }

    async fn track_ids(&self) -> StoreResult<Vec<TrackId>> {
        Ok(self.catalog.read().await.track_ids())
    }

    async fn load_track(&self, track_id: TrackId) -> StoreResult<Option<TrackEntry>> {
        Ok(self.catalog.read().await.entry(track_id))
    }

    async fn put_metadata(&self, metadata: &TrackMetadata) -> StoreResult<()> {
        self.catalog.write().await.put_metadata(metadata.clone());
        Ok(())
    }

    async fn get_metadata(&self, ids: &[TrackId]) -> StoreResult<Vec<TrackMetadata>> {
        Ok(self.catalog.read().await.metadata(ids))
    }

    async fn list_metadata(&self) -> StoreResult<Vec<TrackMetadata>> {
        Ok(self.catalog.read().await.all_metadata())
    }
}

/// Catalog held in memory and persisted as one snapshot file.
///
/// Every write rewrites the snapshot to a temporary file and renames it over
/// the previous one; a failed write leaves both the file and the in-memory
/// catalog unchanged.
pub struct FilesystemStore {
    path: PathBuf,
    writer: SnapshotWriter,
    feature_dim: usize,
    catalog: RwLock<Catalog>,
}

impl FilesystemStore {
    /// Load the snapshot at the configured path, or start empty if there is none
    pub fn open(config: &FilesystemConfig, feature_dim: usize) -> StoreResult<Self> {
        let path = config.snapshot_path.clone();
        let catalog = if path.exists() {
            let snapshot = SnapshotReader::read(&path).map_err(|e| match e {
                SnapshotError::Io(io) => StoreError::Backend(
                    anyhow::Error::new(io)
                        .context(format!("Failed to read snapshot {}", path.display())),
                ),
                other => StoreError::CorruptSnapshot(other),
            })?;
            let catalog = Catalog::from_snapshot(snapshot, feature_dim)?;
            log::info!(
                "Loaded snapshot {} ({} tracks, {} postings)",
                path.display(),
                catalog.num_tracks(),
                catalog.num_postings()
            );
            catalog
        } else {
            log::info!("No snapshot at {}, starting with an empty catalog", path.display());
            Catalog::new()
        };

        Ok(Self {
            path,
            writer: SnapshotWriter::new(config.compress),
            feature_dim,
            catalog: RwLock::new(catalog),
        })
    }

    fn persist(&self, catalog: &Catalog) -> StoreResult<()> {
        let snapshot = catalog.to_snapshot(self.feature_dim)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.path.with_extension("tmp");
        self.writer
            .write(&tmp, &snapshot)
            .with_context(|| format!("Failed to write snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path).with_context(|| {
            format!("Failed to move snapshot into place at {}", self.path.display())
        })?;

        log::debug!(
            "Wrote snapshot {} ({} tracks)",
            self.path.display(),
            snapshot.tracks.len()
        );
        Ok(())
    }
}

#[async_trait]
impl TrackStore for FilesystemStore {
    async fn replace_track(&self, entry: &TrackEntry) -> StoreResult<()> {
        let mut catalog = self.catalog.write().await;
        let previous = catalog.replace(entry.clone());

        if let Err(e) = self.persist(&catalog) {
            match previous {
                Some(old) => {
                    catalog.replace(old);
                }
                None => {
                    catalog.remove(entry.track_id);
                }
            }
            return Err(e);
        }
        Ok(())
    }

    async fn remove_track(&self, track_id: TrackId) -> StoreResult<bool> {
        let mut catalog = self.catalog.write().await;
        let Some(previous) = catalog.remove(track_id) else {
            return Ok(false);
        };

        if let Err(e) = self.persist(&catalog) {
            catalog.replace(previous);
            return Err(e);
        }
        Ok(true)
    }

    async fn lookup_postings(&self, hashes: &[u64]) -> StoreResult<Vec<Posting>> {
        Ok(self.catalog.read().await.lookup(hashes))
    }

    async fn load_segment_bag(&self, track_id: TrackId) -> StoreResult<Option<Arc<SegmentBag>>> {
        Ok(self.catalog.read().await.segment_bag(track_id))
    }

    async fn load_segment_bags(&self) -> StoreResult<Vec<(TrackId, Arc<SegmentBag>)>> {
        Ok(self.catalog.read().await.segment_bags())
    }

    async fn track_ids(&self) -> StoreResult<Vec<TrackId>> {
        Ok(self.catalog.read().await.track_ids())
    }

    async fn load_track(&self, track_id: TrackId) -> StoreResult<Option<TrackEntry>> {
        Ok(self.catalog.read().await.entry(track_id))
    }

    async fn put_metadata(&self, metadata: &TrackMetadata) -> StoreResult<()> {
        let mut catalog = self.catalog.write().await;
        let previous = catalog.put_metadata(metadata.clone());

        if let Err(e) = self.persist(&catalog) {
            catalog.restore_metadata(metadata.track_id, previous);
            return Err(e);
        }
        Ok(())
    }

    async fn get_metadata(&self, ids: &[TrackId]) -> StoreResult<Vec<TrackMetadata>> {
        Ok(self.catalog.read().await.metadata(ids))
    }

    async fn list_metadata(&self) -> StoreResult<Vec<TrackMetadata>> {
        Ok(self.catalog.read().await.all_metadata())
    }
}

/// PostgreSQL-based storage backend
pub struct PostgresqlStore {
    pool: deadpool_postgres::Pool,
    feature_dim: usize,
}

impl PostgresqlStore {
    /// Connect, verify the connection and create the schema if needed
    pub async fn new(config: &PostgresqlConfig, feature_dim: usize) -> StoreResult<Self> {
        let pool = tunedex_db::connect(&tunedex_db::ConnectOptions {
            host: &config.host,
            port: config.port,
            database: &config.database,
            user: &config.user,
            password: &config.password,
            max_connections: config.max_connections,
        })
        .await?;

        Ok(Self { pool, feature_dim })
    }

    fn decode_bag(&self, track_id: TrackId, blob: &[u8]) -> StoreResult<Arc<SegmentBag>> {
        decode_vectors(blob, self.feature_dim)
            .map(Arc::new)
            .map_err(|source| StoreError::CorruptBlob { track_id, source })
    }
}

fn metadata_from_row(track: tunedex_db::Track) -> TrackMetadata {
    TrackMetadata {
        track_id: track.id,
        title: track.title,
        artist: track.artist,
        album: track.album,
        duration_s: track.duration_s,
        image: track.image,
    }
}

#[async_trait]
impl TrackStore for PostgresqlStore {
    async fn replace_track(&self, entry: &TrackEntry) -> StoreResult<()> {
        let segment_blob = encode_vectors(entry.segments.as_slice(), self.feature_dim).map_err(
            |source| StoreError::CorruptBlob {
                track_id: entry.track_id,
                source,
            },
        )?;

        // hashes are stored bit-for-bit in a signed BIGINT
        let index = tunedex_db::NewTrackIndex {
            track_id: entry.track_id,
            postings: entry
                .fingerprints
                .iter()
                .map(|fp| tunedex_db::NewPosting {
                    hash: fp.hash as i64,
                    anchor_time: fp.anchor_time as i32,
                })
                .collect(),
            segment_blob,
        };

        tunedex_db::replace_track_index(&self.pool, &index).await?;
        Ok(())
    }

    async fn remove_track(&self, track_id: TrackId) -> StoreResult<bool> {
        Ok(tunedex_db::delete_track_index(&self.pool, track_id).await?)
    }

    async fn lookup_postings(&self, hashes: &[u64]) -> StoreResult<Vec<Posting>> {
        let mut keys: Vec<i64> = hashes.iter().map(|&h| h as i64).collect();
        keys.sort_unstable();
        keys.dedup();

        let rows = tunedex_db::lookup_postings(&self.pool, &keys).await?;
        Ok(rows
            .into_iter()
            .map(|r| Posting {
                hash: r.hash as u64,
                track_id: r.track_id,
                anchor_time: r.anchor_time as u32,
            })
            .collect())
    }

    async fn load_segment_bag(&self, track_id: TrackId) -> StoreResult<Option<Arc<SegmentBag>>> {
        tunedex_db::get_segment_blob(&self.pool, track_id)
            .await?
            .map(|row| self.decode_bag(row.track_id, &row.vec))
            .transpose()
    }

    async fn load_segment_bags(&self) -> StoreResult<Vec<(TrackId, Arc<SegmentBag>)>> {
        tunedex_db::get_all_segment_blobs(&self.pool)
            .await?
            .into_iter()
            .map(|row| Ok((row.track_id, self.decode_bag(row.track_id, &row.vec)?)))
            .collect()
    }

    async fn track_ids(&self) -> StoreResult<Vec<TrackId>> {
        Ok(tunedex_db::get_indexed_track_ids(&self.pool).await?)
    }

    async fn load_track(&self, track_id: TrackId) -> StoreResult<Option<TrackEntry>> {
        let Some(row) = tunedex_db::get_segment_blob(&self.pool, track_id).await? else {
            return Ok(None);
        };
        let segments = self.decode_bag(track_id, &row.vec)?;
        let postings = tunedex_db::get_postings_by_track(&self.pool, track_id).await?;

        Ok(Some(TrackEntry {
            track_id,
            fingerprints: postings
                .into_iter()
                .map(|p| Fingerprint {
                    hash: p.hash as u64,
                    anchor_time: p.anchor_time as u32,
                })
                .collect(),
            segments: Arc::try_unwrap(segments).unwrap_or_else(|shared| (*shared).clone()),
        }))
    }

    async fn put_metadata(&self, metadata: &TrackMetadata) -> StoreResult<()> {
        let track = tunedex_db::NewTrack {
            id: metadata.track_id,
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            album: metadata.album.clone(),
            duration_s: metadata.duration_s,
            image: metadata.image.clone(),
        };
        tunedex_db::upsert_track(&self.pool, &track).await?;
        Ok(())
    }

    async fn get_metadata(&self, ids: &[TrackId]) -> StoreResult<Vec<TrackMetadata>> {
        let rows = tunedex_db::get_tracks_by_ids(&self.pool, ids).await?;
        Ok(rows.into_iter().map(metadata_from_row).collect())
    }

    async fn list_metadata(&self) -> StoreResult<Vec<TrackMetadata>> {
        let rows = tunedex_db::get_all_tracks(&self.pool).await?;
        Ok(rows.into_iter().map(metadata_from_row).collect())
    }
}
