use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::time::Duration;

/// Owns the Postgres connection pool; handles connection lifecycle and
/// migrations.
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// `database_url` must already carry `client_encoding=UTF8` as a query
    /// parameter (see `Config::database_url`); we don't second-guess it here.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options =
            PgConnectOptions::from_str(database_url).context("invalid database URL")?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect_with(options)
            .await
            .context("failed to create connection pool")?;

        Ok(Self { pool })
    }

    /// Applies all pending migrations from `./migrations`. Safe to call
    /// multiple times.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
