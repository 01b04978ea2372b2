//! Segment-bag similarity
//!
//! A track is a bag of normalised segment vectors. Two bags are compared by
//! taking every cross pair's cosine similarity and averaging the `k` largest.
//! Multi-seed scores are the plain mean of the single-seed scores.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{MatchError, Result};
use crate::TrackId;

/// Normalised segment vectors of one track, in segment order
pub type SegmentBag = Vec<Vec<f32>>;

/// One ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTrack {
    pub track_id: TrackId,
    pub score: f64,
}

/// Wall-clock limit of a catalog scan
#[derive(Debug, Clone, Copy)]
pub struct ScanDeadline {
    at: Instant,
    budget_ms: u64,
}

impl ScanDeadline {
    pub fn after_ms(budget_ms: u64) -> Self {
        Self {
            at: Instant::now() + Duration::from_millis(budget_ms),
            budget_ms,
        }
    }

    fn check(&self) -> Result<()> {
        if Instant::now() >= self.at {
            Err(MatchError::DeadlineExceeded {
                deadline_ms: self.budget_ms,
            })
        } else {
            Ok(())
        }
    }
}

/// Cosine similarity in `[-1, 1]`; 0 when either vector has zero norm
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    cosine_with_norms(a, norm_a, b, norm_b)
}

fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}

fn cosine_with_norms(a: &[f32], norm_a: f64, b: &[f32], norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum();
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Mean of the `min(k, |a|·|b|)` largest cross-pair cosine similarities
pub fn pair_score(a: &[Vec<f32>], b: &[Vec<f32>], k: usize) -> f64 {
    if a.is_empty() || b.is_empty() || k == 0 {
        return 0.0;
    }

    let norms_b: Vec<f64> = b.iter().map(|v| l2_norm(v)).collect();
    let mut sims = Vec::with_capacity(a.len() * b.len());
    for va in a {
        let na = l2_norm(va);
        for (vb, &nb) in b.iter().zip(&norms_b) {
            sims.push(cosine_with_norms(va, na, vb, nb));
        }
    }

    let k = k.min(sims.len());
    let descending = |x: &f64, y: &f64| y.total_cmp(x);
    if k < sims.len() {
        sims.select_nth_unstable_by(k - 1, descending);
        sims.truncate(k);
    }
    // fixed summation order regardless of partition layout
    sims.sort_unstable_by(descending);

    sims.iter().sum::<f64>() / k as f64
}

fn by_score_then_id(a: &SimilarTrack, b: &SimilarTrack) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.track_id.cmp(&b.track_id))
}

/// Rank catalog tracks by their mean pair score against every seed bag.
///
/// Tracks whose id is in `exclude` are skipped. The result holds at most
/// `top_n` entries, by descending score with ties broken by ascending id.
pub fn rank_candidates(
    seeds: &[&[Vec<f32>]],
    exclude: &HashSet<TrackId>,
    catalog: &[(TrackId, Arc<SegmentBag>)],
    top_n: usize,
    k: usize,
    deadline: Option<ScanDeadline>,
) -> Result<Vec<SimilarTrack>> {
    if seeds.is_empty() {
        return Err(MatchError::input("at least one seed track is required"));
    }

    let mut scored = catalog
        .par_iter()
        .filter(|(track_id, _)| !exclude.contains(track_id))
        .map(|(track_id, bag)| -> Result<SimilarTrack> {
            if let Some(deadline) = &deadline {
                deadline.check()?;
            }
            let total: f64 = seeds.iter().map(|seed| pair_score(seed, bag, k)).sum();
            Ok(SimilarTrack {
                track_id: *track_id,
                score: total / seeds.len() as f64,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    scored.sort_by(by_score_then_id);
    scored.truncate(top_n);
    Ok(scored)
}

/// Single-seed ranking; the query track never ranks against itself
pub fn rank_against_catalog(
    query_id: TrackId,
    query: &[Vec<f32>],
    catalog: &[(TrackId, Arc<SegmentBag>)],
    top_n: usize,
    k: usize,
    deadline: Option<ScanDeadline>,
) -> Result<Vec<SimilarTrack>> {
    let exclude = HashSet::from([query_id]);
    rank_candidates(&[query], &exclude, catalog, top_n, k, deadline)
}

/// Multi-seed ranking; every seed is excluded from the candidates
pub fn rank_multi_seed(
    seeds: &[(TrackId, &[Vec<f32>])],
    catalog: &[(TrackId, Arc<SegmentBag>)],
    top_n: usize,
    k: usize,
    deadline: Option<ScanDeadline>,
) -> Result<Vec<SimilarTrack>> {
    let exclude: HashSet<TrackId> = seeds.iter().map(|(id, _)| *id).collect();
    let bags: Vec<&[Vec<f32>]> = seeds.iter().map(|(_, bag)| *bag).collect();
    rank_candidates(&bags, &exclude, catalog, top_n, k, deadline)
}
