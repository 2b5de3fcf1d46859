//! Database connection management.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};

/// Owns the connection pool and the migration/health-check entry points.
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        info!("connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| {
                error!("failed to connect to database: {e}");
                StoreError::Connection(e.to_string())
            })?;

        info!("database connection established");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the schema migrations in order. Idempotent only on a fresh
    /// database; rerunning against an already-migrated one fails loudly.
    pub async fn migrate(&self) -> Result<()> {
        info!("running database migrations");

        let migration_0001 = include_str!("../migrations/0001_init.sql");
        let migration_0002 = include_str!("../migrations/0002_performance_indexes.sql");

        sqlx::raw_sql(migration_0001)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("migration 0001 failed: {e}");
                StoreError::Migration(format!("0001_init.sql: {e}"))
            })?;

        sqlx::raw_sql(migration_0002)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("migration 0002 failed: {e}");
                StoreError::Migration(format!("0002_performance_indexes.sql: {e}"))
            })?;

        info!("database migrations completed");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("select 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn health_monitor(&self) -> crate::health::HealthMonitor {
        crate::health::HealthMonitor::new(self.pool.clone())
    }
}
