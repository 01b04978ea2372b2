//! Migration tool for copying an index between storage backends
//!
//! Usage:
//!   tdmigrate --source-config config.toml --dest-config config.postgresql.toml
//!   tdmigrate --source-config config.toml --dest-config config.postgresql.toml --dry-run

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tunedex_cli::setup::{init_logging, load_config, open_configured_store};
use tunedex_core::TrackStore;

#[derive(Parser, Debug)]
#[command(name = "tdmigrate")]
#[command(about = "Copy indexed tracks and metadata between storage backends", long_about = None)]
struct Args {
    /// Source configuration file
    #[arg(long)]
    source_config: PathBuf,

    /// Destination configuration file
    #[arg(long)]
    dest_config: PathBuf,

    /// Dry run - show what would be migrated without actually migrating
    #[arg(long)]
    dry_run: bool,

    /// Skip tracks that already exist in destination
    #[arg(long)]
    skip_existing: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    log::info!("🚀 Starting index migration");

    let source = open_from(&args.source_config, "Source").await?;
    let dest = open_from(&args.dest_config, "Destination").await?;

    migrate(source.as_ref(), dest.as_ref(), args.dry_run, args.skip_existing).await?;

    log::info!("✅ Migration completed successfully");
    Ok(())
}

async fn open_from(path: &Path, role: &str) -> Result<std::sync::Arc<dyn TrackStore>> {
    log::info!("📂 {}: configuration file '{}'", role, path.display());
    let config = load_config(Some(path))
        .with_context(|| format!("Failed to load {} configuration", role.to_lowercase()))?;
    open_configured_store(&config).await
}

/// Counts reported at the end of a migration
#[derive(Debug, Default, PartialEq)]
struct MigrationSummary {
    total: usize,
    migrated: usize,
    skipped: usize,
    failed: usize,
    metadata: usize,
}

async fn migrate(
    source: &dyn TrackStore,
    dest: &dyn TrackStore,
    dry_run: bool,
    skip_existing: bool,
) -> Result<MigrationSummary> {
    log::info!("📊 Loading track list from source...");
    let track_ids = source
        .track_ids()
        .await
        .context("Failed to list source tracks")?;
    let existing: HashSet<i64> = if skip_existing {
        dest.track_ids().await?.into_iter().collect()
    } else {
        HashSet::new()
    };

    let mut summary = MigrationSummary {
        total: track_ids.len(),
        ..Default::default()
    };
    log::info!("Found {} tracks to migrate", summary.total);

    for track_id in track_ids {
        if existing.contains(&track_id) {
            log::debug!("  ⏭️  Skipping track {} (already exists)", track_id);
            summary.skipped += 1;
            continue;
        }

        let entry = match source.load_track(track_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                log::warn!("  ⚠️  Track {} disappeared from source, skipping", track_id);
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                log::error!("  ❌ Failed to read track {}: {}", track_id, e);
                summary.failed += 1;
                continue;
            }
        };

        if dry_run {
            log::info!(
                "  [DRY RUN] Would migrate track {} ({} postings, {} segments)",
                track_id,
                entry.fingerprints.len(),
                entry.segments.len()
            );
            summary.migrated += 1;
            continue;
        }

        match dest.replace_track(&entry).await {
            Ok(()) => {
                log::info!(
                    "  ✅ Migrated track {} ({} postings, {} segments)",
                    track_id,
                    entry.fingerprints.len(),
                    entry.segments.len()
                );
                summary.migrated += 1;
            }
            Err(e) => {
                log::error!("  ❌ Failed to migrate track {}: {}", track_id, e);
                summary.failed += 1;
            }
        }
    }

    let metadata = source
        .list_metadata()
        .await
        .context("Failed to list source metadata")?;
    for record in &metadata {
        if dry_run {
            summary.metadata += 1;
            continue;
        }
        match dest.put_metadata(record).await {
            Ok(()) => summary.metadata += 1,
            Err(e) => {
                log::error!("  ❌ Failed to copy metadata of track {}: {}", record.track_id, e);
                summary.failed += 1;
            }
        }
    }

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📈 Migration Summary:");
    log::info!("   Total tracks:   {}", summary.total);
    log::info!("   ✅ Migrated:    {}", summary.migrated);
    log::info!("   ⏭️  Skipped:     {}", summary.skipped);
    log::info!("   ❌ Failed:      {}", summary.failed);
    log::info!("   🏷️  Metadata:    {}", summary.metadata);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if summary.failed > 0 {
        anyhow::bail!("{} records failed to migrate", summary.failed);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunedex_core::{Fingerprint, MemoryStore, TrackEntry, TrackMetadata, FEATURE_DIM};

    fn entry(track_id: i64) -> TrackEntry {
        TrackEntry {
            track_id,
            fingerprints: vec![Fingerprint {
                hash: 0xabc + track_id as u64,
                anchor_time: 3,
            }],
            segments: vec![vec![0.5; FEATURE_DIM]],
        }
    }

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from([
            "tdmigrate",
            "--source-config",
            "config.toml",
            "--dest-config",
            "config.postgresql.toml",
        ]);
        assert_eq!(args.source_config, PathBuf::from("config.toml"));
        assert_eq!(args.dest_config, PathBuf::from("config.postgresql.toml"));
        assert!(!args.dry_run);
        assert!(!args.skip_existing);
    }

    #[tokio::test]
    async fn test_migrate_copies_tracks_and_metadata() {
        let source = MemoryStore::new();
        let dest = MemoryStore::new();
        source.replace_track(&entry(1)).await.unwrap();
        source.replace_track(&entry(2)).await.unwrap();
        source
            .put_metadata(&TrackMetadata {
                track_id: 1,
                title: Some("One".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let summary = migrate(&source, &dest, false, false).await.unwrap();
        assert_eq!(summary.migrated, 2);
        assert_eq!(summary.metadata, 1);
        assert_eq!(dest.load_track(2).await.unwrap(), Some(entry(2)));
        assert_eq!(dest.list_metadata().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let source = MemoryStore::new();
        let dest = MemoryStore::new();
        source.replace_track(&entry(1)).await.unwrap();

        let summary = migrate(&source, &dest, true, false).await.unwrap();
        assert_eq!(summary.migrated, 1);
        assert!(dest.track_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_existing() {
        let source = MemoryStore::new();
        let dest = MemoryStore::new();
        source.replace_track(&entry(1)).await.unwrap();
        source.replace_track(&entry(2)).await.unwrap();
        dest.replace_track(&entry(1)).await.unwrap();

        let summary = migrate(&source, &dest, false, true).await.unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.migrated, 1);
    }
}
