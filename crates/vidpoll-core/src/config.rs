//! Run configuration
//!
//! One immutable [`PollConfig`] is built per run (defaults, then an optional
//! JSON file, then command-line overrides) and handed to every component at
//! construction time.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{EntityId, PollPlan};

// ============================================================================
// Constants
// ============================================================================

/// Default seconds between round starts
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;

/// Default length of the polling window in hours
pub const DEFAULT_DURATION_HOURS: f64 = 3.0;

/// `videos.list` accepts at most 50 ids per call
pub const MAX_BATCH: usize = 50;

/// Default root directory for per-entity output
pub const DEFAULT_OUTPUT_DIR: &str = "data";

/// Default number of attempts per batch before it is skipped
pub const DEFAULT_MAX_RETRIES: u32 = 6;

/// Default first backoff delay in seconds
pub const DEFAULT_INITIAL_BACKOFF_SECONDS: f64 = 2.0;

/// Quota units charged per `videos.list` call
pub const DEFAULT_COST_PER_CALL: u64 = 1;

/// Environment variable pointing at a JSON config file
pub const CONFIG_ENV: &str = "VIDPOLL_CONFIG";

// ============================================================================
// Configuration
// ============================================================================

/// Retry settings for a single batch fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts per batch (including the first)
    pub max_retries: u32,
    /// Delay before the second attempt; doubles after each failure
    pub initial_backoff_seconds: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_seconds: DEFAULT_INITIAL_BACKOFF_SECONDS,
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.initial_backoff_seconds).unwrap_or(Duration::ZERO)
    }
}

/// Quota accounting settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub cost_per_call: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            cost_per_call: DEFAULT_COST_PER_CALL,
        }
    }
}

/// Complete configuration for one polling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_seconds: u64,
    pub duration_hours: f64,
    pub output_dir: PathBuf,
    pub max_calls: Option<u64>,
    pub max_batch_size: usize,
    pub retry: RetryConfig,
    pub quota: QuotaConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECONDS,
            duration_hours: DEFAULT_DURATION_HOURS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_calls: None,
            max_batch_size: MAX_BATCH,
            retry: RetryConfig::default(),
            quota: QuotaConfig::default(),
        }
    }
}

impl PollConfig {
    /// Load a configuration from a JSON file; missing keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        let config: PollConfig = serde_json::from_str(&content).map_err(|e| {
            Error::config(format!("invalid config file {}: {}", path.display(), e))
        })?;
        log::debug!("[config] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Per-user config file location (`<config dir>/vidpoll/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("vidpoll").join("config.json"))
    }

    /// Resolve the config file to load: explicit path, then `$VIDPOLL_CONFIG`,
    /// then the per-user file if it exists. Falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_json_file(&crate::utils::expand_path(path));
        }
        if let Ok(p) = std::env::var(CONFIG_ENV) {
            return Self::from_json_file(&crate::utils::expand_path(Path::new(&p)));
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_json_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check the values that every component relies on
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == 0 {
            return Err(Error::config("interval_seconds must be > 0"));
        }
        if !self.duration_hours.is_finite() || self.duration_hours <= 0.0 {
            return Err(Error::config("duration_hours must be a positive number"));
        }
        if self.max_batch_size == 0 {
            return Err(Error::config("max_batch_size must be > 0"));
        }
        if self.max_batch_size > MAX_BATCH {
            log::warn!(
                "[config] max_batch_size {} is above the API limit of {} ids per call",
                self.max_batch_size,
                MAX_BATCH
            );
        }
        if self.retry.max_retries == 0 {
            return Err(Error::config("retry.max_retries must be >= 1"));
        }
        if !self.retry.initial_backoff_seconds.is_finite() || self.retry.initial_backoff_seconds < 0.0 {
            return Err(Error::config("retry.initial_backoff_seconds must be >= 0"));
        }
        if self.max_calls == Some(0) {
            return Err(Error::config("max_calls must be > 0 when set"));
        }
        Ok(())
    }

    /// Build the immutable run plan for the given entities
    pub fn plan(&self, entity_ids: Vec<EntityId>) -> Result<PollPlan> {
        self.validate()?;
        PollPlan::new(
            entity_ids,
            self.interval_seconds,
            self.duration_hours,
            self.max_calls,
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
