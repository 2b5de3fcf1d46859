//! Postgres-backed persistence for the data contract coordination service.
//!
//! [`postgres::PostgresStore`] implements `contractor_core::ports::Store`
//! for the publish/proposal state machines. Everything outside that state
//! machine (teams, plain registration/asset reads, API keys, audit queries)
//! is served by [`repository::Repository`], which talks to the pool
//! directly rather than through a `Tx`.

pub mod config;
pub mod connection;
pub mod error;
pub mod health;
pub mod postgres;
pub mod repository;

pub use connection::Database;
pub use error::{Result, StoreError};
pub use postgres::PostgresStore;
pub use repository::Repository;
