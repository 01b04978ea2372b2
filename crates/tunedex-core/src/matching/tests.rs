//! Tests for offset voting

use super::*;

fn fp(hash: u64, anchor_time: u32) -> Fingerprint {
    Fingerprint { hash, anchor_time }
}

fn posting(hash: u64, track_id: TrackId, anchor_time: u32) -> Posting {
    Posting {
        hash,
        track_id,
        anchor_time,
    }
}

#[test]
fn test_consistent_offset_wins() {
    // Track 1 aligns at offset 100 three times; track 2 has scattered hits.
    let query = vec![fp(1, 0), fp(2, 5), fp(3, 9)];
    let postings = vec![
        posting(1, 1, 100),
        posting(2, 1, 105),
        posting(3, 1, 109),
        posting(1, 2, 7),
        posting(2, 2, 40),
        posting(3, 2, 80),
    ];

    let tally = VoteTally::collect(&query, &postings);
    assert_eq!(tally.cast(), 6);
    assert_eq!(tally.best(), Some((1, 100, 3)));

    let outcome = tally.resolve(1, 0.5);
    let id = outcome.identification().unwrap();
    assert_eq!(id.track_id, 1);
    assert_eq!(id.offset, 100);
    assert_eq!(id.matches, 3);
    assert!((id.offset_seconds - 50.0).abs() < 1e-9);
}

#[test]
fn test_repeated_query_hash_votes_per_anchor() {
    let query = vec![fp(7, 0), fp(7, 10)];
    let postings = vec![posting(7, 3, 20)];

    let tally = VoteTally::collect(&query, &postings);
    assert_eq!(tally.cast(), 2);
    assert_eq!(tally.candidates(), 2);
}

#[test]
fn test_negative_offsets_allowed() {
    let tally = VoteTally::collect(&[fp(9, 50)], &[posting(9, 4, 10)]);
    assert_eq!(tally.best(), Some((4, -40, 1)));
}

#[test]
fn test_tie_break_lowest_track_then_offset() {
    let mut tally = VoteTally::new();
    for _ in 0..3 {
        tally.vote(9, 1);
        tally.vote(5, 12);
        tally.vote(5, 3);
    }
    tally.vote(2, 0);

    assert_eq!(tally.best(), Some((5, 3, 3)));
}

#[test]
fn test_empty_tally_is_no_match() {
    let tally = VoteTally::collect(&[fp(1, 0)], &[]);
    assert!(tally.is_empty());
    assert_eq!(tally.resolve(1, 0.01), IdentifyOutcome::NoMatch);

    let tally = VoteTally::collect(&[], &[posting(1, 1, 1)]);
    assert_eq!(tally.resolve(1, 0.01), IdentifyOutcome::NoMatch);
}

#[test]
fn test_min_matches_threshold() {
    let mut tally = VoteTally::new();
    tally.vote(1, 0);
    tally.vote(1, 0);

    assert!(tally.resolve(2, 0.01).is_match());
    assert_eq!(tally.resolve(3, 0.01), IdentifyOutcome::NoMatch);
}
