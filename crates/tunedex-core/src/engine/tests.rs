//! End-to-end tests on synthetic audio

use super::*;
use crate::config::FEATURE_DIM;
use crate::error::StoreError;
use crate::matching::Posting;
use crate::storage_backend::{MemoryStore, StoreResult};
use crate::test_signals::{add_noise, excerpt, synth_track, test_config, SAMPLE_RATE};
use approx::assert_relative_eq;
use async_trait::async_trait;

fn engine() -> Engine<MemoryStore> {
    Engine::new(
        test_config(),
        AffineScaler::identity(FEATURE_DIM),
        Arc::new(MemoryStore::new()),
    )
    .unwrap()
}

async fn engine_with_catalog() -> (Engine<MemoryStore>, Vec<Vec<f32>>) {
    let engine = engine();
    let tracks: Vec<Vec<f32>> = (1..=3).map(|seed| synth_track(seed, 20.0)).collect();
    for (i, wave) in tracks.iter().enumerate() {
        engine.ingest_track(i as TrackId + 1, wave).await.unwrap();
    }
    (engine, tracks)
}

#[tokio::test]
async fn test_self_identification_with_offset() {
    let (engine, tracks) = engine_with_catalog().await;

    let query = excerpt(&tracks[1], 100, 5.0);
    let outcome = engine.identify(&query).await.unwrap();
    let id = outcome.identification().expect("excerpt should match");

    assert_eq!(id.track_id, 2);
    assert_eq!(id.offset, 100);
    assert!(id.matches >= 10, "only {} aligned matches", id.matches);
    assert_relative_eq!(id.offset_seconds, 100.0 * 256.0 / SAMPLE_RATE as f64);
}

#[tokio::test]
async fn test_identification_survives_noise() {
    let (engine, tracks) = engine_with_catalog().await;

    let query = add_noise(&excerpt(&tracks[2], 60, 6.0), 0.05, 7);
    let outcome = engine.identify(&query).await.unwrap();
    let id = outcome.identification().expect("noisy excerpt should still match");

    assert_eq!(id.track_id, 3);
    assert_eq!(id.offset, 60);
}

#[tokio::test]
async fn test_identification_is_deterministic() {
    let (engine, tracks) = engine_with_catalog().await;
    let query = add_noise(&excerpt(&tracks[0], 40, 4.0), 0.1, 11);

    let first = engine.identify(&query).await.unwrap();
    for _ in 0..3 {
        assert_eq!(engine.identify(&query).await.unwrap(), first);
    }
}

#[tokio::test]
async fn test_silence_is_no_match() {
    let (engine, _) = engine_with_catalog().await;
    let silence = vec![0.0f32; SAMPLE_RATE as usize * 3];
    assert_eq!(engine.identify(&silence).await.unwrap(), IdentifyOutcome::NoMatch);
}

#[tokio::test]
async fn test_empty_query_is_input_error() {
    let engine = engine();
    assert!(matches!(engine.identify(&[]).await, Err(MatchError::Input(_))));
}

#[tokio::test]
async fn test_unknown_audio_is_no_match_on_empty_index() {
    let engine = engine();
    let query = synth_track(99, 3.0);
    assert_eq!(engine.identify(&query).await.unwrap(), IdentifyOutcome::NoMatch);
}

#[tokio::test]
async fn test_too_short_track_is_rejected_and_not_stored() {
    let engine = engine();
    // longer than one STFT frame, shorter than one 2 s segment
    let short = synth_track(5, 1.5);

    let err = engine.ingest_track(7, &short).await.unwrap_err();
    assert!(matches!(err, MatchError::Input(ref msg) if msg.contains("too short")));
    assert!(engine.store().track_ids().await.unwrap().is_empty());
    assert_eq!(engine.identify(&short).await.unwrap(), IdentifyOutcome::NoMatch);
}

#[tokio::test]
async fn test_ingest_summary_counts() {
    let engine = engine();
    let summary = engine.ingest_track(1, &synth_track(1, 10.0)).await.unwrap();

    // 2 s segments every 1 s over 10 s
    assert_eq!(summary.segments, 9);
    assert!(summary.postings > 0);
    let bag = engine.store().load_segment_bag(1).await.unwrap().unwrap();
    assert_eq!(bag.len(), 9);
    assert!(bag.iter().all(|v| v.len() == FEATURE_DIM));
}

#[tokio::test]
async fn test_reingestion_replaces_previous_version() {
    let engine = engine();
    let old = synth_track(1, 12.0);
    let new = synth_track(2, 12.0);

    engine.ingest_track(1, &old).await.unwrap();
    engine.ingest_track(1, &new).await.unwrap();

    let hit = engine.identify(&excerpt(&new, 50, 4.0)).await.unwrap();
    let hit = hit.identification().expect("new version should match");
    assert_eq!(hit.track_id, 1);

    // only chance hash collisions remain for the old audio
    let stale = engine.identify(&excerpt(&old, 50, 4.0)).await.unwrap();
    let stale_votes = stale.identification().map_or(0, |id| id.matches);
    assert!(stale_votes * 5 < hit.matches, "{} stale votes", stale_votes);
}

#[tokio::test]
async fn test_find_similar_excludes_query_and_is_sorted() {
    let (engine, _) = engine_with_catalog().await;

    let ranked = engine.find_similar(1, 10).await.unwrap();
    let ids: Vec<TrackId> = ranked.iter().map(|r| r.track_id).collect();

    assert_eq!(ranked.len(), 2);
    assert!(!ids.contains(&1));
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(ranked.iter().all(|r| (-1.0..=1.0).contains(&r.score)));
}

#[tokio::test]
async fn test_duplicate_track_scores_one() {
    let (engine, tracks) = engine_with_catalog().await;
    engine.ingest_track(4, &tracks[0]).await.unwrap();

    let ranked = engine.find_similar(1, 1).await.unwrap();
    assert_eq!(ranked[0].track_id, 4);
    assert_relative_eq!(ranked[0].score, 1.0, epsilon = 1e-6);
}

#[tokio::test]
async fn test_single_seed_recommend_equals_find_similar() {
    let (engine, _) = engine_with_catalog().await;

    let similar = engine.find_similar(2, 6).await.unwrap();
    assert_eq!(engine.recommend(&[2], 6).await.unwrap(), similar);
    // repeated seeds count once
    assert_eq!(engine.recommend(&[2, 2], 6).await.unwrap(), similar);
}

#[tokio::test]
async fn test_recommend_excludes_every_seed() {
    let (engine, _) = engine_with_catalog().await;
    let ranked = engine.recommend(&[1, 3], 6).await.unwrap();
    assert_eq!(ranked.iter().map(|r| r.track_id).collect::<Vec<_>>(), vec![2]);
}

#[tokio::test]
async fn test_similarity_input_errors() {
    let (engine, _) = engine_with_catalog().await;

    assert!(matches!(engine.recommend(&[], 6).await, Err(MatchError::Input(_))));
    assert!(matches!(
        engine.find_similar(42, 6).await,
        Err(MatchError::UnknownTrack(42))
    ));
    assert!(matches!(
        engine.recommend(&[1, 42], 6).await,
        Err(MatchError::UnknownTrack(42))
    ));
}

#[tokio::test]
async fn test_read_your_writes() {
    let (engine, _) = engine_with_catalog().await;
    let fresh = synth_track(10, 8.0);

    engine.ingest_track(10, &fresh).await.unwrap();

    let ranked = engine.find_similar(1, 10).await.unwrap();
    assert!(ranked.iter().any(|r| r.track_id == 10));
    assert!(engine.find_similar(10, 3).await.is_ok());

    let hit = engine.identify(&excerpt(&fresh, 30, 3.0)).await.unwrap();
    assert_eq!(hit.identification().map(|id| id.track_id), Some(10));

    assert!(engine.remove_track(10).await.unwrap());
    assert!(matches!(
        engine.find_similar(10, 3).await,
        Err(MatchError::UnknownTrack(10))
    ));
}

#[tokio::test]
async fn test_expired_deadline_surfaces() {
    let mut config = test_config();
    config.similarity.scan_deadline_ms = Some(0);
    let engine = Engine::new(
        config,
        AffineScaler::identity(FEATURE_DIM),
        Arc::new(MemoryStore::new()),
    )
    .unwrap();
    engine.ingest_track(1, &synth_track(1, 4.0)).await.unwrap();
    engine.ingest_track(2, &synth_track(2, 4.0)).await.unwrap();

    assert!(matches!(
        engine.find_similar(1, 5).await,
        Err(MatchError::DeadlineExceeded { deadline_ms: 0 })
    ));
}

#[tokio::test]
async fn test_describe_joins_metadata() {
    let (engine, _) = engine_with_catalog().await;
    engine
        .register_metadata(&TrackMetadata {
            track_id: 2,
            title: Some("Two".into()),
            artist: Some("Synth".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let results = vec![
        SimilarTrack {
            track_id: 2,
            score: 0.87654,
        },
        SimilarTrack {
            track_id: 3,
            score: 0.5,
        },
    ];
    let described = engine.describe(&results).await.unwrap();

    assert_eq!(described[0].title.as_deref(), Some("Two"));
    assert_relative_eq!(described[0].match_percent, 87.7);
    assert!(described[1].title.is_none());
    assert_relative_eq!(described[1].match_percent, 50.0);
    assert_eq!(engine.metadata(2).await.unwrap().unwrap().artist.as_deref(), Some("Synth"));
}

#[test]
fn test_scaler_dimension_must_match_front_end() {
    let result = Engine::new(
        test_config(),
        AffineScaler::identity(10),
        Arc::new(MemoryStore::new()),
    );
    assert!(matches!(result, Err(MatchError::Config(_))));
}

/// Store whose segment blobs fail to decode
struct CorruptStore {
    inner: MemoryStore,
}

impl CorruptStore {
    fn corrupt(track_id: TrackId) -> StoreError {
        let source = tunedex_format::decode_vectors(&[0u8; 12], FEATURE_DIM).unwrap_err();
        StoreError::CorruptBlob { track_id, source }
    }
}

#[async_trait]
impl TrackStore for CorruptStore {
    async fn replace_track(&self, entry: &TrackEntry) -> StoreResult<()> {
        self.inner.replace_track(entry).await
    }

    async fn remove_track(&self, track_id: TrackId) -> StoreResult<bool> {
        self.inner.remove_track(track_id).await
    }

    async fn lookup_postings(&self, hashes: &[u64]) -> StoreResult<Vec<Posting>> {
        self.inner.lookup_postings(hashes).await
    }

    async fn load_segment_bag(&self, track_id: TrackId) -> StoreResult<Option<Arc<SegmentBag>>> {
        Err(Self::corrupt(track_id))
    }

    async fn load_segment_bags(&self) -> StoreResult<Vec<(TrackId, Arc<SegmentBag>)>> {
        Err(Self::corrupt(1))
    }

    async fn track_ids(&self) -> StoreResult<Vec<TrackId>> {
        self.inner.track_ids().await
    }

    async fn load_track(&self, track_id: TrackId) -> StoreResult<Option<TrackEntry>> {
        self.inner.load_track(track_id).await
    }

    async fn put_metadata(&self, metadata: &TrackMetadata) -> StoreResult<()> {
        self.inner.put_metadata(metadata).await
    }

    async fn get_metadata(&self, ids: &[TrackId]) -> StoreResult<Vec<TrackMetadata>> {
        self.inner.get_metadata(ids).await
    }

    async fn list_metadata(&self) -> StoreResult<Vec<TrackMetadata>> {
        self.inner.list_metadata().await
    }
}

#[tokio::test]
async fn test_corrupt_segment_blob_is_index_corruption() {
    let engine = Engine::new(
        test_config(),
        AffineScaler::identity(FEATURE_DIM),
        Arc::new(CorruptStore {
            inner: MemoryStore::new(),
        }),
    )
    .unwrap();
    engine.ingest_track(1, &synth_track(1, 4.0)).await.unwrap();

    assert!(matches!(
        engine.find_similar(1, 5).await,
        Err(MatchError::IndexCorruption(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_versions_during_reingestion() {
    let (engine, tracks) = engine_with_catalog().await;
    let engine = Arc::new(engine);
    let version_a = tracks[0].clone();
    let version_b = synth_track(50, 20.0);
    let query = excerpt(&version_a, 80, 4.0);

    // what readers observe with each version fully installed
    let identified_a = engine.identify(&query).await.unwrap();
    let similar_a = engine.find_similar(2, 10).await.unwrap();
    engine.ingest_track(1, &version_b).await.unwrap();
    let identified_b = engine.identify(&query).await.unwrap();
    let similar_b = engine.find_similar(2, 10).await.unwrap();
    assert_ne!(identified_a, identified_b);
    assert_ne!(similar_a, similar_b);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for round in 0..6 {
                let wave = if round % 2 == 0 { &version_a } else { &version_b };
                engine.ingest_track(1, wave).await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let query = query.clone();
            tokio::spawn(async move {
                let mut seen = Vec::new();
                for _ in 0..5 {
                    let identified = engine.identify(&query).await.unwrap();
                    let similar = engine.find_similar(2, 10).await.unwrap();
                    seen.push((identified, similar));
                }
                seen
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in readers {
        for (identified, similar) in reader.await.unwrap() {
            assert!(identified == identified_a || identified == identified_b);
            assert!(similar == similar_a || similar == similar_b);
        }
    }
}

#[tokio::test]
async fn test_results_identical_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = crate::storage_config::FilesystemConfig {
        snapshot_path: dir.path().join("catalog.snapshot"),
        compress: true,
    };
    let open = || {
        let store = crate::storage_backend::FilesystemStore::open(&config, FEATURE_DIM).unwrap();
        Engine::new(test_config(), AffineScaler::identity(FEATURE_DIM), Arc::new(store)).unwrap()
    };

    let tracks: Vec<Vec<f32>> = (1..=3).map(|seed| synth_track(seed, 12.0)).collect();
    let query = excerpt(&tracks[1], 70, 4.0);

    let engine = open();
    for (i, wave) in tracks.iter().enumerate() {
        engine.ingest_track(i as TrackId + 1, wave).await.unwrap();
    }
    let identified = engine.identify(&query).await.unwrap();
    let similar = engine.find_similar(1, 5).await.unwrap();
    let recommended = engine.recommend(&[1, 3], 5).await.unwrap();
    assert_eq!(identified.identification().map(|id| id.track_id), Some(2));
    drop(engine);

    let reopened = open();
    assert_eq!(reopened.identify(&query).await.unwrap(), identified);
    assert_eq!(reopened.find_similar(1, 5).await.unwrap(), similar);
    assert_eq!(reopened.recommend(&[1, 3], 5).await.unwrap(), recommended);
}
