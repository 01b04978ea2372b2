//! Engine façade
//!
//! Ingestion runs the full analysis (fingerprints and segment bag) before
//! touching the store, then hands both to a single atomic `replace_track`,
//! so a failure in either half commits nothing.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::catalog::{TrackEntry, TrackMetadata};
use crate::config::MatchConfig;
use crate::error::{MatchError, Result};
use crate::fingerprint::{Fingerprint, FingerprintHasher};
use crate::frontend::{SignalFrontEnd, StftFrontEnd};
use crate::matching::{IdentifyOutcome, VoteTally};
use crate::peaks::PeakExtractor;
use crate::scaler::AffineScaler;
use crate::segmentation::segment_audio;
use crate::similarity::{rank_multi_seed, ScanDeadline, SegmentBag, SimilarTrack};
use crate::storage_backend::TrackStore;
use crate::transform::frame_count;
use crate::TrackId;

#[cfg(test)]
mod tests;

/// What one ingestion wrote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestSummary {
    pub track_id: TrackId,
    pub postings: usize,
    pub segments: usize,
}

/// A ranked result joined with whatever metadata the track has
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribedTrack {
    pub track_id: TrackId,
    pub score: f64,
    /// `100 · score`, one decimal place
    pub match_percent: f64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_s: Option<f64>,
    pub image: Option<String>,
}

/// CPU-bound half of the pipeline, shared with blocking worker threads
struct Analyzer {
    config: MatchConfig,
    frontend: Arc<dyn SignalFrontEnd>,
    scaler: AffineScaler,
    peaks: PeakExtractor,
    hasher: FingerprintHasher,
}

impl Analyzer {
    fn check_waveform(&self, waveform: &[f32]) -> Result<()> {
        let n_fft = self.config.spectrogram.n_fft;
        if frame_count(waveform.len(), n_fft, self.config.spectrogram.hop_length) == 0 {
            return Err(MatchError::input(format!(
                "waveform of {} samples is shorter than one {}-sample analysis frame",
                waveform.len(),
                n_fft
            )));
        }
        Ok(())
    }

    fn fingerprints(&self, waveform: &[f32]) -> Result<Vec<Fingerprint>> {
        let spectrogram = self.frontend.spectrogram(waveform)?;
        let peaks = self.peaks.extract(&spectrogram);
        let fingerprints = self.hasher.generate(&peaks);

        log::debug!(
            "{} frames -> {} peaks -> {} fingerprints",
            spectrogram.num_frames,
            peaks.len(),
            fingerprints.len()
        );
        Ok(fingerprints)
    }

    fn segment_bag(&self, waveform: &[f32]) -> Result<SegmentBag> {
        let segments = segment_audio(waveform, &self.config.segments, self.config.sample_rate)?;

        segments
            .par_iter()
            .map(|segment| {
                let raw = self.frontend.segment_features(segment.samples)?;
                self.scaler.transform(&raw)
            })
            .collect()
    }
}

pub struct Engine<S: TrackStore + ?Sized = dyn TrackStore> {
    analyzer: Arc<Analyzer>,
    store: Arc<S>,
}

impl<S: TrackStore + ?Sized> Engine<S> {
    /// Engine with the default STFT front end
    pub fn new(config: MatchConfig, scaler: AffineScaler, store: Arc<S>) -> Result<Self> {
        let frontend = Arc::new(StftFrontEnd::new(config.clone()));
        Self::with_front_end(config, frontend, scaler, store)
    }

    pub fn with_front_end(
        config: MatchConfig,
        frontend: Arc<dyn SignalFrontEnd>,
        scaler: AffineScaler,
        store: Arc<S>,
    ) -> Result<Self> {
        config.validate()?;
        if scaler.dimension() != frontend.feature_dimension() {
            return Err(MatchError::Config(format!(
                "scaler has dimension {}, front end produces {}",
                scaler.dimension(),
                frontend.feature_dimension()
            )));
        }

        let analyzer = Analyzer {
            peaks: PeakExtractor::new(&config.peaks),
            hasher: FingerprintHasher::new(&config.hashing),
            config,
            frontend,
            scaler,
        };
        Ok(Self {
            analyzer: Arc::new(analyzer),
            store,
        })
    }

    pub fn config(&self) -> &MatchConfig {
        &self.analyzer.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Index a track for both identification and similarity, replacing any
    /// previous version of it
    pub async fn ingest_track(&self, track_id: TrackId, waveform: &[f32]) -> Result<IngestSummary> {
        self.analyzer.check_waveform(waveform)?;

        let analyzer = Arc::clone(&self.analyzer);
        let samples = waveform.to_vec();
        let (fingerprints, segments) = tokio::task::spawn_blocking(move || -> Result<_> {
            let fingerprints = analyzer.fingerprints(&samples)?;
            let segments = analyzer.segment_bag(&samples)?;
            Ok((fingerprints, segments))
        })
        .await??;

        let entry = TrackEntry {
            track_id,
            fingerprints,
            segments,
        };
        self.store.replace_track(&entry).await?;

        let summary = IngestSummary {
            track_id,
            postings: entry.fingerprints.len(),
            segments: entry.segments.len(),
        };
        log::info!(
            "Ingested track {} ({} postings, {} segments)",
            track_id,
            summary.postings,
            summary.segments
        );
        Ok(summary)
    }

    /// Drop a track from both indexes; metadata is kept
    pub async fn remove_track(&self, track_id: TrackId) -> Result<bool> {
        let removed = self.store.remove_track(track_id).await?;
        if removed {
            log::info!("Removed track {}", track_id);
        }
        Ok(removed)
    }

    /// Identify the track a waveform excerpt comes from
    pub async fn identify(&self, waveform: &[f32]) -> Result<IdentifyOutcome> {
        self.analyzer.check_waveform(waveform)?;

        let analyzer = Arc::clone(&self.analyzer);
        let samples = waveform.to_vec();
        let query = tokio::task::spawn_blocking(move || analyzer.fingerprints(&samples)).await??;
        if query.is_empty() {
            return Ok(IdentifyOutcome::NoMatch);
        }

        let hashes: Vec<u64> = query
            .iter()
            .map(|fp| fp.hash)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let postings = self.store.lookup_postings(&hashes).await?;

        let config = self.config();
        let tally = VoteTally::collect(&query, &postings);
        let outcome = tally.resolve(config.identify.min_matches, config.frame_seconds());

        match outcome.identification() {
            Some(id) => log::debug!(
                "Query: {} hashes, {} postings, {} votes; best track {} at offset {} ({} matches)",
                hashes.len(),
                postings.len(),
                tally.cast(),
                id.track_id,
                id.offset,
                id.matches
            ),
            None => log::debug!(
                "Query: {} hashes, {} postings, no match",
                hashes.len(),
                postings.len()
            ),
        }
        Ok(outcome)
    }

    /// Tracks most similar to one indexed track, excluding itself
    pub async fn find_similar(&self, track_id: TrackId, top_n: usize) -> Result<Vec<SimilarTrack>> {
        self.recommend(&[track_id], top_n).await
    }

    /// Tracks most similar on average to every seed, excluding the seeds.
    /// Repeated seeds count once.
    pub async fn recommend(&self, seeds: &[TrackId], top_n: usize) -> Result<Vec<SimilarTrack>> {
        if seeds.is_empty() {
            return Err(MatchError::input("at least one seed track is required"));
        }
        let deadline = self.config().similarity.scan_deadline_ms.map(ScanDeadline::after_ms);

        let catalog = self.store.load_segment_bags().await?;
        let by_id: HashMap<TrackId, &Arc<SegmentBag>> =
            catalog.iter().map(|(id, bag)| (*id, bag)).collect();

        let mut seed_bags: Vec<(TrackId, Arc<SegmentBag>)> = Vec::with_capacity(seeds.len());
        for &id in seeds.iter().collect::<BTreeSet<_>>() {
            let bag = by_id.get(&id).ok_or_else(|| MatchError::UnknownTrack(id))?;
            seed_bags.push((id, Arc::clone(bag)));
        }
        drop(by_id);

        let k = self.config().similarity.top_k;
        let ranked = tokio::task::spawn_blocking(move || {
            let seeds: Vec<(TrackId, &[Vec<f32>])> = seed_bags
                .iter()
                .map(|(id, bag)| (*id, bag.as_slice()))
                .collect();
            rank_multi_seed(&seeds, &catalog, top_n, k, deadline)
        })
        .await??;

        log::debug!(
            "Ranked catalog against {} seed(s): {} results",
            seeds.len(),
            ranked.len()
        );
        Ok(ranked)
    }

    /// Join ranked results with stored metadata
    pub async fn describe(&self, results: &[SimilarTrack]) -> Result<Vec<DescribedTrack>> {
        let ids: Vec<TrackId> = results.iter().map(|r| r.track_id).collect();
        let metadata: HashMap<TrackId, TrackMetadata> = self
            .store
            .get_metadata(&ids)
            .await?
            .into_iter()
            .map(|m| (m.track_id, m))
            .collect();

        Ok(results
            .iter()
            .map(|r| {
                let meta = metadata.get(&r.track_id).cloned().unwrap_or_default();
                DescribedTrack {
                    track_id: r.track_id,
                    score: r.score,
                    match_percent: (r.score * 1000.0).round() / 10.0,
                    title: meta.title,
                    artist: meta.artist,
                    album: meta.album,
                    duration_s: meta.duration_s,
                    image: meta.image,
                }
            })
            .collect())
    }

    pub async fn register_metadata(&self, metadata: &TrackMetadata) -> Result<()> {
        self.store.put_metadata(metadata).await?;
        Ok(())
    }

    /// Stored metadata of one track, if any
    pub async fn metadata(&self, track_id: TrackId) -> Result<Option<TrackMetadata>> {
        Ok(self.store.get_metadata(&[track_id]).await?.into_iter().next())
    }
}
