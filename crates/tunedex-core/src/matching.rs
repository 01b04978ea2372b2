//! Offset voting and identification results
//!
//! Every posting that shares a hash with the query casts one vote for
//! `(track, t_db - t_q)`. The heaviest pair wins; ties go to the lowest
//! track id, then the lowest offset.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::fingerprint::Fingerprint;
use crate::TrackId;

#[cfg(test)]
mod tests;

/// One stored `(hash, track, anchor_time)` row of the inverted index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub hash: u64,
    pub track_id: TrackId,
    pub anchor_time: u32,
}

/// Best-aligned track for a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub track_id: TrackId,
    /// Frames between the start of the track and the start of the query
    pub offset: i64,
    /// Votes behind the winning alignment
    pub matches: usize,
    /// `offset` converted to seconds
    pub offset_seconds: f64,
}

/// Result of an identification query. "No match" is an ordinary outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IdentifyOutcome {
    Match(Identification),
    NoMatch,
}

impl IdentifyOutcome {
    pub fn identification(&self) -> Option<&Identification> {
        match self {
            IdentifyOutcome::Match(id) => Some(id),
            IdentifyOutcome::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, IdentifyOutcome::Match(_))
    }
}

/// Vote tally of one query, dropped when the query resolves
#[derive(Debug, Default)]
pub struct VoteTally {
    votes: HashMap<(TrackId, i64), usize>,
    cast: usize,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally votes of the query fingerprints against looked-up postings
    pub fn collect(query: &[Fingerprint], postings: &[Posting]) -> Self {
        let mut by_hash: HashMap<u64, Vec<&Posting>> = HashMap::new();
        for posting in postings {
            by_hash.entry(posting.hash).or_default().push(posting);
        }

        let mut tally = Self::new();
        for fp in query {
            if let Some(hits) = by_hash.get(&fp.hash) {
                for hit in hits {
                    tally.vote(hit.track_id, hit.anchor_time as i64 - fp.anchor_time as i64);
                }
            }
        }

        tally
    }

    pub fn vote(&mut self, track_id: TrackId, offset: i64) {
        *self.votes.entry((track_id, offset)).or_insert(0) += 1;
        self.cast += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Total votes cast
    pub fn cast(&self) -> usize {
        self.cast
    }

    /// Distinct `(track, offset)` pairs that received votes
    pub fn candidates(&self) -> usize {
        self.votes.len()
    }

    /// Winning `(track_id, offset, votes)`, independent of map iteration order
    pub fn best(&self) -> Option<(TrackId, i64, usize)> {
        self.votes
            .iter()
            .map(|(&(track_id, offset), &count)| (track_id, offset, count))
            .min_by(|a, b| {
                b.2.cmp(&a.2)
                    .then_with(|| a.0.cmp(&b.0))
                    .then_with(|| a.1.cmp(&b.1))
            })
    }

    /// Resolve the tally into an outcome
    pub fn resolve(&self, min_matches: usize, frame_seconds: f64) -> IdentifyOutcome {
        match self.best() {
            Some((track_id, offset, matches)) if matches >= min_matches.max(1) => {
                IdentifyOutcome::Match(Identification {
                    track_id,
                    offset,
                    matches,
                    offset_seconds: offset as f64 * frame_seconds,
                })
            }
            _ => IdentifyOutcome::NoMatch,
        }
    }
}
