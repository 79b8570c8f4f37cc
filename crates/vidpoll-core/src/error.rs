//! Unified error handling for vidpoll-core

use thiserror::Error;

use crate::services::fetch::FetchError;

/// Core error type for vidpoll-core
#[derive(Error, Debug)]
pub enum Error {
    /// Bad interval, duration, batch size or entity list
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No usable credential could be found
    #[error("Authentication unavailable: {0}")]
    AuthenticationUnavailable(String),

    /// Pre-flight estimate exceeds the operator's call budget
    #[error("Quota exceeded: planned {planned} calls > max_calls {max}")]
    QuotaExceeded { planned: u64, max: u64 },

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Stopped by the operator before a one-shot operation finished
    #[error("Cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for vidpoll-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfiguration(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::AuthenticationUnavailable(msg.into())
    }

    /// Whether this error must stop the whole run before any remote call
    pub fn is_preflight_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfiguration(_)
                | Error::AuthenticationUnavailable(_)
                | Error::QuotaExceeded { .. }
        )
    }
}
