//! Error types for the contractor client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("HTTP request failed: {url}, status: {status:?}, error: {error}")]
    HttpRequest {
        url: String,
        status: Option<u16>,
        error: String,
    },

    #[error("network timeout after {timeout_secs}s: {context}")]
    NetworkTimeout { timeout_secs: u64, context: String },

    #[error("network connection error: {0}")]
    NetworkConnection(String),

    #[error("API error {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("JSON parsing error: {context}, error: {error}")]
    JsonParse { context: String, error: String },
}

impl SdkError {
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;
        match self {
            Self::HttpRequest { .. } | Self::NetworkTimeout { .. } | Self::NetworkConnection(_) => {
                Level::WARN
            }
            Self::Api { status, .. } if *status >= 500 => Level::WARN,
            Self::Api { .. } => Level::DEBUG,
            Self::JsonParse { .. } => Level::WARN,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkTimeout { .. } | Self::NetworkConnection(_) | Self::HttpRequest { .. } => {
                true
            }
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        let status = err.status().map(|s| s.as_u16());

        if err.is_timeout() {
            Self::NetworkTimeout { timeout_secs: 30, context: url }
        } else if err.is_connect() {
            Self::NetworkConnection(format!("failed to connect to {url}: {err}"))
        } else {
            Self::HttpRequest { url, status, error: err.to_string() }
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonParse { context: "response body".to_string(), error: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
