//! tdsimilar - rank indexed tracks by acoustic similarity
//!
//! Usage:
//!   tdsimilar --track-id 42                       # tracks like 42
//!   tdsimilar --track-id 42 --track-id 7 -n 10    # tracks like both

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tunedex_cli::output::print_json;
use tunedex_cli::setup::{init_logging, load_config, open_engine};

#[derive(Parser, Debug)]
#[command(name = "tdsimilar")]
#[command(about = "Find tracks similar to one or more seed tracks", long_about = None)]
struct Args {
    /// Seed track; repeat for multi-seed recommendations
    #[arg(long = "track-id", required = true)]
    track_ids: Vec<i64>,

    /// Number of results
    #[arg(short = 'n', long, default_value_t = 6)]
    top_n: usize,

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

    let ranked = match args.track_ids.as_slice() {
        [seed] => engine.find_similar(*seed, args.top_n).await?,
        seeds => engine.recommend(seeds, args.top_n).await?,
    };
    log::info!("🔎 {} similar tracks", ranked.len());

    let described = engine.describe(&ranked).await?;
    print_json(&described)
}
