//! Stats fetch trait and error types
//!
//! Defines the interface the scheduler uses to pull statistics for one batch
//! of entities, and the transient/fatal classification that drives retries.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ PollingScheduler / PreflightGate             │
//! └──────────────────────────────────────────────┘
//!          │  fetch_stats(batch) under RetryPolicy
//!          ▼
//! ┌──────────────────────────────────────────────┐
//! │ trait StatsFetcher                           │
//! │   - fetch_stats() -> HashMap<id, record>     │
//! │   - fetcher_id()                             │
//! └──────────────────────────────────────────────┘
//!          │
//!          ▼
//!   ┌──────────────┐
//!   │ YouTube v3   │
//!   │ videos.list  │
//!   └──────────────┘
//! ```

pub mod youtube;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EntityId, StatsRecord};

pub use youtube::YouTubeStatsFetcher;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by a single batch fetch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Rate limiting, server errors and network failures; worth retrying
    #[error("Transient failure{}: {message}", fmt_status(.status))]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Authentication, malformed request or unparseable response; not retried
    #[error("Fatal failure{}: {message}", fmt_status(.status))]
    Fatal {
        status: Option<u16>,
        message: String,
    },
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl FetchError {
    pub fn transient(message: impl Into<String>) -> Self {
        FetchError::Transient {
            status: None,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        FetchError::Fatal {
            status: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP status: 429 and 5xx are transient, everything else fatal
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if is_transient_status(status) {
            FetchError::Transient {
                status: Some(status),
                message,
            }
        } else {
            FetchError::Fatal {
                status: Some(status),
                message,
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Transient { status, .. } | FetchError::Fatal { status, .. } => *status,
        }
    }
}

/// 429 (rate limited) and the 5xx server-error class
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..=599).contains(&status)
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::transient("Request timed out")
        } else if err.is_connect() {
            FetchError::transient("Connection failed")
        } else if err.is_status() {
            match err.status() {
                Some(status) => FetchError::from_status(status.as_u16(), err.to_string()),
                None => FetchError::transient(err.to_string()),
            }
        } else if err.is_decode() || err.is_builder() {
            FetchError::fatal(err.to_string())
        } else {
            FetchError::transient(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::fatal(format!("Invalid response body: {}", err))
    }
}

// ============================================================================
// Fetcher Trait
// ============================================================================

/// Executes one batched "fetch stats" request
///
/// Implementations return a record for each entity the remote side reported;
/// entities it did not report (deleted or private videos) are simply absent.
#[async_trait]
pub trait StatsFetcher: Send + Sync {
    /// Short identifier used in log lines
    fn fetcher_id(&self) -> &'static str;

    /// Fetch current statistics for one batch of entities
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Transient` for rate limiting, server errors and
    /// network failures, `FetchError::Fatal` for everything else.
    async fn fetch_stats(
        &self,
        batch: &[EntityId],
    ) -> Result<HashMap<EntityId, StatsRecord>, FetchError>;
}

// ============================================================================
// Tests
// ============================================================================
