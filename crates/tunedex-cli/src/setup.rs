//! Logging, configuration and engine construction shared by every tool

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tunedex_core::{open_store, AffineScaler, Engine, TrackStore, TunedexConfig, FEATURE_DIM};

/// Configuration file used when `--config` is not given
pub const DEFAULT_CONFIG: &str = "config.toml";

/// Initialise env_logger; `RUST_LOG` still overrides the default level
pub fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

/// Load the given config, or `config.toml` if present, or the filesystem defaults
pub fn load_config(path: Option<&Path>) -> Result<TunedexConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG);
            if !default.exists() {
                log::info!("No {} found, using the default filesystem store", DEFAULT_CONFIG);
                return Ok(TunedexConfig::default_filesystem());
            }
            default
        }
    };

    log::debug!("Loading configuration from {}", path.display());
    TunedexConfig::load(&path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

/// Open the configured store
pub async fn open_configured_store(config: &TunedexConfig) -> Result<Arc<dyn TrackStore>> {
    log::info!("Opening {:?} store", config.storage.backend);
    let store = open_store(&config.storage, FEATURE_DIM)
        .await
        .context("Failed to open track store")?;
    Ok(store)
}

/// Load the configured scaler, or the identity scaler when none is configured
pub fn load_scaler(config: &TunedexConfig) -> Result<AffineScaler> {
    match &config.scaler.path {
        Some(path) => {
            let scaler = AffineScaler::load(path, FEATURE_DIM)?;
            log::debug!("Loaded scaler {}", path.display());
            Ok(scaler)
        }
        None => {
            log::warn!("No scaler configured, segment vectors are not normalised");
            Ok(AffineScaler::identity(FEATURE_DIM))
        }
    }
}

/// Build an engine over the configured store
pub async fn open_engine(config: &TunedexConfig) -> Result<Engine> {
    let store = open_configured_store(config).await?;
    let scaler = load_scaler(config)?;
    let engine = Engine::new(config.matching.clone(), scaler, store)?;
    Ok(engine)
}
