//! Pure coordination logic for data contract publishing: schema diffing,
//! compatibility classification, impact analysis, and the publish/proposal
//! state machines. No IO lives here — see `contractor-store` for the
//! Postgres-backed implementation of the ports this crate defines.

pub mod audit;
pub mod classifier;
pub mod coordinator;
pub mod differ;
pub mod entities;
pub mod error;
pub mod impact;
pub mod ports;
pub mod proposal;
pub mod schema;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{CoreError, Result};
