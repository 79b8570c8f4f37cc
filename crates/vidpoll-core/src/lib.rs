//! # vidpoll-core
//!
//! Core logic for vidpoll - periodic batched statistics polling.
//!
//! This crate provides:
//! - Run configuration and validation (`config` module)
//! - Data models (`models` module)
//! - Quota estimation, batching, retry, scheduling and persistence (`services` module)
//! - Credential discovery (`auth` module)
//! - Unified error handling (`error` module)

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::{Error, Result};

pub use auth::{discover_credentials, Credentials};
pub use config::{PollConfig, QuotaConfig, RetryConfig, MAX_BATCH};
pub use models::{BatchResult, EntityId, Observation, PollPlan, StatsRecord};

pub use services::{
    estimate, estimate_rounds, CsvSink, FetchError, MemorySink, ObservationSink,
    PollingScheduler, PreflightGate, PreflightReport, QuotaEstimate, RetryOutcome, RetryPolicy,
    RunSummary, StatsFetcher, YouTubeStatsFetcher,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = version().split('.').collect();
        assert_eq!(parts.len(), 3, "Version should be in x.y.z format");
    }
}
