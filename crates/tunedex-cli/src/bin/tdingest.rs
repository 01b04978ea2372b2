//! tdingest - index a WAV file for identification and similarity
//!
//! Usage:
//!   tdingest song.wav --track-id 42 --title "Song" --artist "Band"
//!   tdingest --config config.postgresql.toml song.wav --track-id 42

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tunedex_cli::output::print_json;
use tunedex_cli::setup::{init_logging, load_config, open_engine};
use tunedex_core::audio::load_wav;
use tunedex_core::TrackMetadata;

#[derive(Parser, Debug)]
#[command(name = "tdingest")]
#[command(about = "Index a track for identification and similarity search", long_about = None)]
struct Args {
    /// WAV file to index
    input: PathBuf,

    /// Identifier assigned to the track
    #[arg(long)]
    track_id: i64,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    artist: Option<String>,

    #[arg(long)]
    album: Option<String>,

    /// Cover image URL or path
    #[arg(long)]
    image: Option<String>,

    /// Path to configuration file (TOML). If not provided, uses config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())?;
    let engine = open_engine(&config).await?;

    log::info!("🎵 Loading {}", args.input.display());
    let waveform = load_wav(&args.input, config.matching.sample_rate)
        .with_context(|| format!("Failed to load {}", args.input.display()))?;
    let duration_s = waveform.len() as f64 / config.matching.sample_rate as f64;

    let summary = engine
        .ingest_track(args.track_id, &waveform)
        .await
        .with_context(|| format!("Failed to ingest track {}", args.track_id))?;

    engine
        .register_metadata(&TrackMetadata {
            track_id: args.track_id,
            title: args.title,
            artist: args.artist,
            album: args.album,
            duration_s: Some(duration_s),
            image: args.image,
        })
        .await?;

    log::info!("✅ Track {} indexed", args.track_id);
    print_json(&summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from([
            "tdingest",
            "song.wav",
            "--track-id",
            "42",
            "--title",
            "Song",
        ]);
        assert_eq!(args.input, PathBuf::from("song.wav"));
        assert_eq!(args.track_id, 42);
        assert_eq!(args.title.as_deref(), Some("Song"));
        assert!(args.artist.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_track_id_is_required() {
        assert!(Args::try_parse_from(["tdingest", "song.wav"]).is_err());
    }
}
