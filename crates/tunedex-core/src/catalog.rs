//! In-process catalog: inverted fingerprint index, segment bags and metadata
//!
//! Used directly by the memory store and as the working set of the
//! filesystem store, which persists it as a [`CatalogSnapshot`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tunedex_format::{
    decode_vectors, encode_vectors, CatalogSnapshot, MetadataRecord, PostingRecord, TrackRecord,
};

use crate::error::StoreError;
use crate::fingerprint::Fingerprint;
use crate::matching::Posting;
use crate::similarity::SegmentBag;
use crate::TrackId;

/// Everything indexed for one track, replaced as a unit
#[derive(Debug, Clone, PartialEq)]
pub struct TrackEntry {
    pub track_id: TrackId,
    pub fingerprints: Vec<Fingerprint>,
    pub segments: SegmentBag,
}

/// Descriptive fields of a track; all optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub track_id: TrackId,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_s: Option<f64>,
    pub image: Option<String>,
}

impl From<MetadataRecord> for TrackMetadata {
    fn from(r: MetadataRecord) -> Self {
        Self {
            track_id: r.track_id,
            title: r.title,
            artist: r.artist,
            album: r.album,
            duration_s: r.duration_s,
            image: r.image,
        }
    }
}

impl From<&TrackMetadata> for MetadataRecord {
    fn from(m: &TrackMetadata) -> Self {
        Self {
            track_id: m.track_id,
            title: m.title.clone(),
            artist: m.artist.clone(),
            album: m.album.clone(),
            duration_s: m.duration_s,
            image: m.image.clone(),
        }
    }
}

struct IndexedTrack {
    fingerprints: Vec<Fingerprint>,
    segments: Arc<SegmentBag>,
}

#[derive(Default)]
pub struct Catalog {
    postings: HashMap<u64, Vec<(TrackId, u32)>>,
    tracks: BTreeMap<TrackId, IndexedTrack>,
    metadata: BTreeMap<TrackId, TrackMetadata>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `entry`, dropping whatever the track had before. Returns the
    /// previous entry so callers can roll back.
    pub fn replace(&mut self, entry: TrackEntry) -> Option<TrackEntry> {
        let previous = self.remove(entry.track_id);

        for fp in &entry.fingerprints {
            self.postings
                .entry(fp.hash)
                .or_default()
                .push((entry.track_id, fp.anchor_time));
        }
        self.tracks.insert(
            entry.track_id,
            IndexedTrack {
                fingerprints: entry.fingerprints,
                segments: Arc::new(entry.segments),
            },
        );

        previous
    }

    /// Drop a track's postings and segments; metadata is kept
    pub fn remove(&mut self, track_id: TrackId) -> Option<TrackEntry> {
        let track = self.tracks.remove(&track_id)?;

        let hashes: HashSet<u64> = track.fingerprints.iter().map(|fp| fp.hash).collect();
        for hash in hashes {
            if let Some(list) = self.postings.get_mut(&hash) {
                list.retain(|(id, _)| *id != track_id);
                if list.is_empty() {
                    self.postings.remove(&hash);
                }
            }
        }

        Some(TrackEntry {
            track_id,
            fingerprints: track.fingerprints,
            segments: Arc::try_unwrap(track.segments).unwrap_or_else(|shared| (*shared).clone()),
        })
    }

    /// Postings of every distinct hash in `hashes`
    pub fn lookup(&self, hashes: &[u64]) -> Vec<Posting> {
        let distinct: HashSet<u64> = hashes.iter().copied().collect();
        distinct
            .into_iter()
            .filter_map(|hash| self.postings.get(&hash).map(|list| (hash, list)))
            .flat_map(|(hash, list)| {
                list.iter().map(move |&(track_id, anchor_time)| Posting {
                    hash,
                    track_id,
                    anchor_time,
                })
            })
            .collect()
    }

    /// Copy of everything indexed for one track
    pub fn entry(&self, track_id: TrackId) -> Option<TrackEntry> {
        self.tracks.get(&track_id).map(|t| TrackEntry {
            track_id,
            fingerprints: t.fingerprints.clone(),
            segments: (*t.segments).clone(),
        })
    }

    pub fn contains(&self, track_id: TrackId) -> bool {
        self.tracks.contains_key(&track_id)
    }

    pub fn segment_bag(&self, track_id: TrackId) -> Option<Arc<SegmentBag>> {
        self.tracks.get(&track_id).map(|t| Arc::clone(&t.segments))
    }

    /// Every segment bag, by ascending track id
    pub fn segment_bags(&self) -> Vec<(TrackId, Arc<SegmentBag>)> {
        self.tracks
            .iter()
            .map(|(&id, t)| (id, Arc::clone(&t.segments)))
            .collect()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.keys().copied().collect()
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn num_postings(&self) -> usize {
        self.postings.values().map(Vec::len).sum()
    }

    pub fn put_metadata(&mut self, metadata: TrackMetadata) -> Option<TrackMetadata> {
        self.metadata.insert(metadata.track_id, metadata)
    }

    /// Restore a metadata slot to a previous value (or clear it)
    pub fn restore_metadata(&mut self, track_id: TrackId, previous: Option<TrackMetadata>) {
        match previous {
            Some(m) => {
                self.metadata.insert(track_id, m);
            }
            None => {
                self.metadata.remove(&track_id);
            }
        }
    }

    /// Metadata of the requested ids that have any; unknown ids are skipped
    pub fn metadata(&self, ids: &[TrackId]) -> Vec<TrackMetadata> {
        ids.iter()
            .filter_map(|id| self.metadata.get(id).cloned())
            .collect()
    }

    pub fn all_metadata(&self) -> Vec<TrackMetadata> {
        self.metadata.values().cloned().collect()
    }

    pub fn to_snapshot(&self, feature_dim: usize) -> Result<CatalogSnapshot, StoreError> {
        let mut snapshot = CatalogSnapshot::new(feature_dim as u32);

        for (&track_id, track) in &self.tracks {
            let segment_blob = encode_vectors(track.segments.as_slice(), feature_dim)
                .map_err(|source| StoreError::CorruptBlob { track_id, source })?;
            snapshot.tracks.push(TrackRecord {
                track_id,
                postings: track
                    .fingerprints
                    .iter()
                    .map(|fp| PostingRecord {
                        hash: fp.hash,
                        anchor_time: fp.anchor_time,
                    })
                    .collect(),
                segment_blob,
            });
        }
        snapshot.metadata = self.metadata.values().map(MetadataRecord::from).collect();

        Ok(snapshot)
    }

    pub fn from_snapshot(snapshot: CatalogSnapshot, feature_dim: usize) -> Result<Self, StoreError> {
        if snapshot.feature_dim as usize != feature_dim {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "snapshot holds {}-dimensional segment vectors, expected {}",
                snapshot.feature_dim,
                feature_dim
            )));
        }

        let mut catalog = Self::new();
        for record in snapshot.tracks {
            let segments = decode_vectors(&record.segment_blob, feature_dim).map_err(|source| {
                StoreError::CorruptBlob {
                    track_id: record.track_id,
                    source,
                }
            })?;
            catalog.replace(TrackEntry {
                track_id: record.track_id,
                fingerprints: record
                    .postings
                    .into_iter()
                    .map(|p| Fingerprint {
                        hash: p.hash,
                        anchor_time: p.anchor_time,
                    })
                    .collect(),
                segments,
            });
        }
        for record in snapshot.metadata {
            catalog.put_metadata(record.into());
        }

        Ok(catalog)
    }
}
