use anyhow::{Context, Result};
use deadpool_postgres::Pool;

use crate::models::*;

const SCHEMA: &str = include_str!("schema.sql");

/// Create tables and indexes if they do not exist yet
pub async fn ensure_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;

    client
        .batch_execute(SCHEMA)
        .await
        .context("Failed to create schema")?;

    Ok(())
}

/// Replace every posting and the segment blob of one track in a single transaction.
///
/// A transaction-scoped advisory lock on the track id serialises concurrent
/// ingestions of the same track; other tracks proceed in parallel.
pub async fn replace_track_index(pool: &Pool, index: &NewTrackIndex) -> Result<()> {
    let mut client = pool.get().await?;
    let tx = client
        .transaction()
        .await
        .context("Failed to open ingestion transaction")?;

    tx.execute("SELECT pg_advisory_xact_lock($1)", &[&index.track_id])
        .await
        .context("Failed to lock track")?;

    tx.execute("DELETE FROM fingerprints WHERE track_id = $1", &[&index.track_id])
        .await
        .context("Failed to delete previous fingerprints")?;
    tx.execute("DELETE FROM song_segments WHERE track_id = $1", &[&index.track_id])
        .await
        .context("Failed to delete previous segments")?;

    if !index.postings.is_empty() {
        let hashes: Vec<i64> = index.postings.iter().map(|p| p.hash).collect();
        let times: Vec<i32> = index.postings.iter().map(|p| p.anchor_time).collect();

        tx.execute(
            "INSERT INTO fingerprints (hash, track_id, anchor_time)
             SELECT u.hash, $2, u.anchor_time
             FROM UNNEST($1::BIGINT[], $3::INTEGER[]) AS u(hash, anchor_time)",
            &[&hashes, &index.track_id, &times],
        )
        .await
        .context("Failed to batch insert fingerprints")?;
    }

    tx.execute(
        "INSERT INTO song_segments (track_id, vec) VALUES ($1, $2)",
        &[&index.track_id, &index.segment_blob],
    )
    .await
    .context("Failed to insert segment vectors")?;

    tx.commit().await.context("Failed to commit ingestion")?;

    log::debug!(
        "Replaced index of track {} ({} postings, {} blob bytes)",
        index.track_id,
        index.postings.len(),
        index.segment_blob.len()
    );

    Ok(())
}

/// Remove a track's postings and segments. Returns whether anything was removed.
pub async fn delete_track_index(pool: &Pool, track_id: i64) -> Result<bool> {
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;

    tx.execute("SELECT pg_advisory_xact_lock($1)", &[&track_id])
        .await
        .context("Failed to lock track")?;
    let postings = tx
        .execute("DELETE FROM fingerprints WHERE track_id = $1", &[&track_id])
        .await
        .context("Failed to delete fingerprints")?;
    let segments = tx
        .execute("DELETE FROM song_segments WHERE track_id = $1", &[&track_id])
        .await
        .context("Failed to delete segments")?;

    tx.commit().await.context("Failed to commit deletion")?;

    Ok(postings + segments > 0)
}

/// Bulk point lookup of postings by hash key
pub async fn lookup_postings(pool: &Pool, hashes: &[i64]) -> Result<Vec<Posting>> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;
    let keys = hashes.to_vec();

    let rows = client
        .query(
            "SELECT hash, track_id, anchor_time
             FROM fingerprints
             WHERE hash = ANY($1)",
            &[&keys],
        )
        .await
        .context("Failed to look up fingerprints")?;

    Ok(rows
        .iter()
        .map(|r| Posting {
            hash: r.get(0),
            track_id: r.get(1),
            anchor_time: r.get(2),
        })
        .collect())
}

/// Get all postings of one track, ordered by anchor time
pub async fn get_postings_by_track(pool: &Pool, track_id: i64) -> Result<Vec<Posting>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT hash, track_id, anchor_time
             FROM fingerprints
             WHERE track_id = $1
             ORDER BY anchor_time, hash",
            &[&track_id],
        )
        .await
        .context("Failed to get fingerprints by track")?;

    Ok(rows
        .iter()
        .map(|r| Posting {
            hash: r.get(0),
            track_id: r.get(1),
            anchor_time: r.get(2),
        })
        .collect())
}

/// Get the segment blob of one track
pub async fn get_segment_blob(pool: &Pool, track_id: i64) -> Result<Option<SegmentRow>> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT track_id, vec, indexed_at FROM song_segments WHERE track_id = $1",
            &[&track_id],
        )
        .await
        .context("Failed to get segment vectors")?;

    Ok(row.map(|r| SegmentRow {
        track_id: r.get(0),
        vec: r.get(1),
        indexed_at: r.get(2),
    }))
}

/// Get every segment blob, ordered by track id
pub async fn get_all_segment_blobs(pool: &Pool) -> Result<Vec<SegmentRow>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT track_id, vec, indexed_at FROM song_segments ORDER BY track_id",
            &[],
        )
        .await
        .context("Failed to get all segment vectors")?;

    Ok(rows
        .iter()
        .map(|r| SegmentRow {
            track_id: r.get(0),
            vec: r.get(1),
            indexed_at: r.get(2),
        })
        .collect())
}

/// Ids of every track that has been ingested
pub async fn get_indexed_track_ids(pool: &Pool) -> Result<Vec<i64>> {
    let client = pool.get().await?;

    let rows = client
        .query("SELECT track_id FROM song_segments ORDER BY track_id", &[])
        .await
        .context("Failed to list indexed tracks")?;

    Ok(rows.iter().map(|r| r.get(0)).collect())
}

/// Insert or update track metadata
pub async fn upsert_track(pool: &Pool, track: &NewTrack) -> Result<()> {
    let client = pool.get().await?;

    client
        .execute(
            "INSERT INTO tracks (id, title, artist, album, duration_s, image)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 artist = EXCLUDED.artist,
                 album = EXCLUDED.album,
                 duration_s = EXCLUDED.duration_s,
                 image = EXCLUDED.image",
            &[
                &track.id,
                &track.title,
                &track.artist,
                &track.album,
                &track.duration_s,
                &track.image,
            ],
        )
        .await
        .context("Failed to upsert track")?;

    Ok(())
}

/// Bulk point lookup of track metadata; unknown ids are absent from the result
pub async fn get_tracks_by_ids(pool: &Pool, ids: &[i64]) -> Result<Vec<Track>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let client = pool.get().await?;
    let keys = ids.to_vec();

    let rows = client
        .query(
            "SELECT id, title, artist, album, duration_s, image, created_at
             FROM tracks
             WHERE id = ANY($1)
             ORDER BY id",
            &[&keys],
        )
        .await
        .context("Failed to get tracks")?;

    Ok(rows.iter().map(track_from_row).collect())
}

/// Get all track metadata
pub async fn get_all_tracks(pool: &Pool) -> Result<Vec<Track>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT id, title, artist, album, duration_s, image, created_at
             FROM tracks
             ORDER BY id",
            &[],
        )
        .await
        .context("Failed to get all tracks")?;

    Ok(rows.iter().map(track_from_row).collect())
}

fn track_from_row(r: &tokio_postgres::Row) -> Track {
    Track {
        id: r.get(0),
        title: r.get(1),
        artist: r.get(2),
        album: r.get(3),
        duration_s: r.get(4),
        image: r.get(5),
        created_at: r.get(6),
    }
}
