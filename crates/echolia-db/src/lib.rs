//! Echolia DB - Postgres connection pool and migrations.
//!
//! The only schema this crate owns is the quota ledger's master table;
//! `echolia-quota::QuotaLedger` runs its single-statement upsert directly
//! against the pool this crate hands out.

pub mod config;
pub mod error;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub use config::DatabaseConfig;
pub use error::{DbError, DbResult};

/// Postgres connection pool.
pub struct Database {
    pub pg: PgPool,
}

impl Database {
    /// Connect to PostgreSQL.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        info!("connecting to postgresql: {}", config.postgres_url_masked());

        let pg = PgPoolOptions::new()
            .max_connections(config.pg_max_connections)
            .min_connections(config.pg_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.pg_acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await
            .map_err(|e| DbError::Connection(format!("postgresql: {e}")))?;

        info!("connected to postgresql");

        Ok(Self { pg })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> DbResult<()> {
        info!("running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pg)
            .await
            .map_err(|e| DbError::Migration(e.to_string()))?;
        info!("migrations complete");
        Ok(())
    }

    /// Health check for the Postgres connection.
    pub async fn health_check(&self) -> DbResult<HealthStatus> {
        let postgres = sqlx::query("SELECT 1").fetch_one(&self.pg).await.is_ok();
        Ok(HealthStatus { postgres })
    }
}

/// Health status of the database connection.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub postgres: bool,
}
