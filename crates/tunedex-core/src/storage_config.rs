//! Deployment configuration for Tunedex
//!
//! TOML file selecting the storage backend (memory, filesystem snapshot or
//! PostgreSQL), the pretrained scaler and the algorithm parameters.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::MatchConfig;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunedexConfig {
    pub storage: StorageConfig,
    #[serde(default)]
    pub scaler: ScalerConfig,
    #[serde(default)]
    pub matching: MatchConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub postgresql: PostgresqlConfig,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Filesystem,
    Postgresql,
}

/// Filesystem backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,
    /// zstd-compress the snapshot payload
    #[serde(default = "default_compress")]
    pub compress: bool,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            compress: default_compress(),
        }
    }
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./tunedex.snapshot")
}

fn default_compress() -> bool {
    true
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "tunedex".to_string()
}
fn default_user() -> String {
    "tunedex_user".to_string()
}
fn default_password() -> String {
    "tunedex_pass".to_string()
}
fn default_max_connections() -> u32 {
    10
}

/// Pretrained feature scaler location. Without a path the identity scaler is used.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ScalerConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl TunedexConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: TunedexConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        config.matching.validate()?;
        Ok(config)
    }

    /// Get PostgreSQL connection string
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            StorageBackend::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    pg.user, pg.password, pg.host, pg.port, pg.database
                ))
            }
            _ => None,
        }
    }

    fn with_backend(backend: StorageBackend) -> Self {
        Self {
            storage: StorageConfig {
                backend,
                filesystem: FilesystemConfig::default(),
                postgresql: PostgresqlConfig::default(),
            },
            scaler: ScalerConfig::default(),
            matching: MatchConfig::default(),
        }
    }

    pub fn default_memory() -> Self {
        Self::with_backend(StorageBackend::Memory)
    }

    pub fn default_filesystem() -> Self {
        Self::with_backend(StorageBackend::Filesystem)
    }

    pub fn default_postgresql() -> Self {
        Self::with_backend(StorageBackend::Postgresql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filesystem_config() {
        let config = TunedexConfig::default_filesystem();
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
        assert_eq!(
            config.storage.filesystem.snapshot_path,
            PathBuf::from("./tunedex.snapshot")
        );
        assert!(config.storage.filesystem.compress);
        assert!(config.connection_string().is_none());
    }

    #[test]
    fn test_connection_string() {
        let config = TunedexConfig::default_postgresql();
        let conn_str = config.connection_string().unwrap();
        assert!(conn_str.contains("postgresql://"));
        assert!(conn_str.contains("tunedex_user"));
        assert!(conn_str.contains("localhost:5432"));
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
            [storage]
            backend = "postgresql"

            [storage.postgresql]
            host = "db.example.com"
            port = 5433
            database = "catalog"
            max_connections = 20

            [scaler]
            path = "models/scaler.json"

            [matching]
            sample_rate = 22050

            [matching.similarity]
            top_k = 5
            scan_deadline_ms = 2000
        "#;

        let config: TunedexConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Postgresql);
        assert_eq!(config.storage.postgresql.port, 5433);
        assert_eq!(config.storage.postgresql.user, "tunedex_user");
        assert_eq!(config.scaler.path, Some(PathBuf::from("models/scaler.json")));
        assert_eq!(config.matching.similarity.top_k, 5);
        assert_eq!(config.matching.similarity.scan_deadline_ms, Some(2000));
        assert_eq!(config.matching.spectrogram.n_fft, 2048);
    }

    #[test]
    fn test_load_rejects_invalid_matching() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"[storage]\nbackend = \"memory\"\n[matching.similarity]\ntop_k = 0\n",
        )
        .unwrap();
        assert!(TunedexConfig::load(file.path()).is_err());
    }
}
