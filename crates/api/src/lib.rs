//! HTTP API for the data contract coordination service.
//!
//! Exposes the publish/proposal workflow in `contractor-core` over REST,
//! behind scoped API-key auth and per-IP rate limiting.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use server::{Server, ServerConfig};
pub use state::AppState;
