//! Error types owned by this crate: connection setup, migrations, and
//! configuration. Errors surfaced through the `Tx`/`Store` trait methods
//! defined in `contractor-core` travel as `anyhow::Error` instead, per that
//! crate's port contracts.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl StoreError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::Connection(_) | Self::Migration(_) | Self::Config(_) => Level::ERROR,
            Self::Query(_) => Level::ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
