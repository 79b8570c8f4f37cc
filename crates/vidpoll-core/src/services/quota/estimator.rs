//! Up-front quota estimation
//!
//! Turns (entity count, interval, duration, batch size) into the number of
//! remote calls a run will make. The estimate multiplies rounds by the number
//! of batches per round; counting rounds alone undercounts any run tracking
//! more than one batch worth of entities.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::duration_millis;

/// Planned call volume for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaEstimate {
    /// Number of polling rounds in the window
    pub rounds: u64,
    /// Remote calls needed to cover every entity once
    pub batches_per_round: u64,
    /// `rounds * batches_per_round`
    pub total_calls: u64,
    /// `total_calls * cost_per_call`
    pub quota_units: u64,
}

impl QuotaEstimate {
    /// Whether the plan fits under an optional call budget
    pub fn fits(&self, max_calls: Option<u64>) -> bool {
        max_calls.map_or(true, |max| self.total_calls <= max)
    }
}

/// Number of rounds in the window: `ceil(duration_hours * 3600 / interval_seconds)`
pub fn estimate_rounds(interval_seconds: u64, duration_hours: f64) -> Result<u64> {
    if interval_seconds == 0 {
        return Err(Error::config("interval_seconds must be > 0"));
    }
    if !duration_hours.is_finite() || duration_hours <= 0.0 {
        return Err(Error::config("duration_hours must be a positive number"));
    }

    let window_ms = duration_millis(duration_hours);
    let interval_ms = interval_seconds.saturating_mul(1_000);
    Ok(div_ceil(window_ms, interval_ms).max(1))
}

/// Estimate the calls and quota units a run will consume
pub fn estimate(
    entity_count: usize,
    interval_seconds: u64,
    duration_hours: f64,
    max_batch_size: usize,
    cost_per_call: u64,
) -> Result<QuotaEstimate> {
    if max_batch_size == 0 {
        return Err(Error::config("max_batch_size must be > 0"));
    }

    let rounds = estimate_rounds(interval_seconds, duration_hours)?;
    let batches_per_round = div_ceil(entity_count as u64, max_batch_size as u64);
    let total_calls = rounds.saturating_mul(batches_per_round);

    Ok(QuotaEstimate {
        rounds,
        batches_per_round,
        total_calls,
        quota_units: total_calls.saturating_mul(cost_per_call),
    })
}

fn div_ceil(numerator: u64, denominator: u64) -> u64 {
    if numerator == 0 {
        0
    } else {
        (numerator - 1) / denominator + 1
    }
}
