//! tdidentify - identify the indexed track a recording comes from
//!
//! Usage:
//!   tdidentify excerpt.wav
//!   tdidentify --config config.postgresql.toml excerpt.wav

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tunedex_cli::output::{print_json, IdentifyOutput};
use tunedex_cli::setup::{init_logging, load_config, open_engine};
use tunedex_core::audio::load_wav;

#[derive(Parser, Debug)]
#[command(name = "tdidentify")]
#[command(about = "Identify a recording against the index", long_about = None)]
struct Args {
    /// WAV excerpt to identify
    query: PathBuf,

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

    let waveform = load_wav(&args.query, config.matching.sample_rate)
        .with_context(|| format!("Failed to load {}", args.query.display()))?;

    let outcome = engine.identify(&waveform).await?;
    let output = match outcome.identification() {
        Some(id) => {
            log::info!(
                "🎯 Track {} at {:.2}s ({} matches)",
                id.track_id,
                id.offset_seconds,
                id.matches
            );
            let metadata = engine.metadata(id.track_id).await?;
            IdentifyOutput::new(Some(id), metadata)
        }
        None => {
            log::info!("No match for {}", args.query.display());
            IdentifyOutput::new(None, None)
        }
    };

    print_json(&output)
}
