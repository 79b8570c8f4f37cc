//! Data models for vidpoll

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::services::fetch::FetchError;

/// Opaque caller-supplied identifier of a tracked entity (a video ID)
pub type EntityId = String;

/// IDs shorter than this are probably truncated or mistyped
pub const SHORT_ID_THRESHOLD: usize = 8;

/// Statistics reported by the remote API for one entity
///
/// Every field is nullable: the API omits counters that are hidden by the
/// uploader and snippet fields for private videos.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRecord {
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
    pub comment_count: Option<u64>,
    pub published_at: Option<String>,
    pub title: Option<String>,
    /// ISO-8601 duration as reported by the API (e.g. `PT4M13S`)
    pub duration: Option<String>,
}

/// One persisted sample of an entity's statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub entity_id: EntityId,
    /// Shared round timestamp, identical for every entity of one round
    pub observed_at: DateTime<Utc>,
    pub stats: StatsRecord,
}

impl Observation {
    pub fn new(entity_id: impl Into<EntityId>, observed_at: DateTime<Utc>, stats: StatsRecord) -> Self {
        Self {
            entity_id: entity_id.into(),
            observed_at,
            stats,
        }
    }
}

/// Outcome of one batch within a round
#[derive(Debug)]
pub enum BatchResult {
    /// The batch was fetched; entities missing from the map were not reported
    Fetched(HashMap<EntityId, StatsRecord>),
    /// The batch could not be fetched after retries (or failed fatally)
    Failed {
        batch_index: usize,
        entity_ids: Vec<EntityId>,
        attempts: u32,
        error: FetchError,
    },
}

/// Immutable description of a polling run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPlan {
    entity_ids: Vec<EntityId>,
    interval_seconds: u64,
    duration_hours: f64,
    max_calls: Option<u64>,
}

impl PollPlan {
    /// Build a validated plan
    ///
    /// Rejects an empty entity list, blank IDs, a zero interval, a
    /// non-positive or non-finite duration and a zero `max_calls`.
    pub fn new(
        entity_ids: Vec<EntityId>,
        interval_seconds: u64,
        duration_hours: f64,
        max_calls: Option<u64>,
    ) -> Result<Self> {
        if entity_ids.is_empty() {
            return Err(Error::config("at least one entity id is required"));
        }
        if entity_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(Error::config("entity ids must not be blank"));
        }
        if interval_seconds == 0 {
            return Err(Error::config("interval_seconds must be > 0"));
        }
        if !duration_hours.is_finite() || duration_hours <= 0.0 {
            return Err(Error::config(format!(
                "duration_hours must be a positive number, got {}",
                duration_hours
            )));
        }
        if duration_millis(duration_hours) == 0 {
            return Err(Error::config("duration_hours is shorter than one millisecond"));
        }
        if max_calls == Some(0) {
            return Err(Error::config("max_calls must be > 0 when set"));
        }

        Ok(Self {
            entity_ids,
            interval_seconds,
            duration_hours,
            max_calls,
        })
    }

    pub fn entity_ids(&self) -> &[EntityId] {
        &self.entity_ids
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration_hours
    }

    pub fn max_calls(&self) -> Option<u64> {
        self.max_calls
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Length of the polling window, at millisecond precision
    pub fn window(&self) -> Duration {
        Duration::from_millis(duration_millis(self.duration_hours))
    }

    /// IDs that look too short to be real video IDs
    pub fn suspicious_ids(&self) -> Vec<&str> {
        self.entity_ids
            .iter()
            .filter(|id| id.len() < SHORT_ID_THRESHOLD)
            .map(String::as_str)
            .collect()
    }
}

/// Convert a fractional hour count to whole milliseconds
///
/// Rounding to the millisecond keeps values such as `5.0 / 3600.0` from
/// turning into 5.000000001 seconds and gaining an extra round.
pub fn duration_millis(duration_hours: f64) -> u64 {
    (duration_hours * 3_600_000.0).round() as u64
}
