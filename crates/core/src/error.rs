//! Error taxonomy for the coordination core.
//!
//! The core never catches and swallows; every fallible operation returns one
//! of these typed kinds, which the HTTP layer maps to a status code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A conflict whose resolution (e.g. a proposal rejection) has already
    /// been written to `tx` and must be committed along with the error.
    #[error("conflict: {0}")]
    ConflictPersisted(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("broken contract: {0}")]
    BrokenContract(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::NotFound(_) | Self::Validation(_) | Self::Forbidden(_) => Level::WARN,
            Self::Conflict(_) | Self::ConflictPersisted(_) | Self::BrokenContract(_) => Level::WARN,
            Self::Internal(_) => Level::ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_context() {
        let err = CoreError::NotFound("asset 123".to_string());
        assert_eq!(err.to_string(), "not found: asset 123");
    }
}
