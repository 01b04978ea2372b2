//! Database connection management

use anyhow::Context;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use crate::operations::ensure_schema;

pub type DbPool = Pool;

/// Where and as whom to connect
#[derive(Debug, Clone)]
pub struct ConnectOptions<'a> {
    pub host: &'a str,
    pub port: u16,
    pub database: &'a str,
    pub user: &'a str,
    pub password: &'a str,
    pub max_connections: u32,
}

impl ConnectOptions<'_> {
    fn pool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.to_string());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.database.to_string());
        cfg.user = Some(self.user.to_string());
        cfg.password = Some(self.password.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(self.max_connections.max(1) as usize));
        cfg
    }
}

/// Create a pool without touching the server; connections open lazily
pub fn create_pool(options: &ConnectOptions<'_>) -> anyhow::Result<DbPool> {
    let pool = options
        .pool_config()
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create connection pool")?;
    Ok(pool)
}

/// Pool that has reached the server once and whose schema is in place
pub async fn connect(options: &ConnectOptions<'_>) -> anyhow::Result<DbPool> {
    let pool = create_pool(options)?;

    let client = pool.get().await.with_context(|| {
        format!(
            "Failed to connect to {}:{}/{}",
            options.host, options.port, options.database
        )
    })?;
    let row = client.query_one("SELECT 1", &[]).await?;
    let probe: i32 = row.get(0);
    if probe != 1 {
        anyhow::bail!("Database connection test failed");
    }
    drop(client);

    ensure_schema(&pool).await?;
    log::info!(
        "Connected to PostgreSQL at {}:{}/{} (pool size {})",
        options.host,
        options.port,
        options.database,
        options.max_connections.max(1)
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> ConnectOptions<'static> {
        ConnectOptions {
            host: "localhost",
            port: 5432,
            database: "tunedex",
            user: "tunedex_user",
            password: "tunedex_pass",
            max_connections: 0,
        }
    }

    #[test]
    fn test_pool_config_clamps_size() {
        let cfg = local().pool_config();
        assert_eq!(cfg.dbname.as_deref(), Some("tunedex"));
        assert_eq!(cfg.pool.map(|p| p.max_size), Some(1));
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        let pool = create_pool(&local()).unwrap();
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    #[ignore] // Requires PostgreSQL to be running
    async fn test_connect() {
        let options = ConnectOptions {
            max_connections: 2,
            ..local()
        };
        let pool = connect(&options).await.unwrap();
        assert!(pool.get().await.is_ok());
    }
}
