//! Rust client for the data contract coordination service.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ContractorClient, RetryConfig};
pub use error::{Result, SdkError};
