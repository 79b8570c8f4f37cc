//! Polling scheduler
//!
//! Drives one polling run from plan to completion.
//!
//! # Lifecycle
//!
//! ```text
//!  Idle ──► Planning ──(over budget)──► Aborted
//!              │
//!              ▼
//!         RoundActive ◄──────┐
//!              │             │
//!              ▼             │
//!          Sleeping ─────────┘
//!              │ (deadline or cancel)
//!              ▼
//!          Completed
//! ```
//!
//! - Planning estimates the call volume once; a plan over `max_calls` aborts
//!   before any remote call.
//! - Each round takes a single timestamp before its first batch and stamps
//!   every observation of the round with it.
//! - A batch that fails (after retries, or fatally) is logged and skipped; the
//!   round continues with the next batch.
//! - Once the deadline passes mid-round the remaining batches are dropped.
//! - Between rounds the scheduler sleeps the full interval. Time spent
//!   fetching is not subtracted, so rounds drift later over a long run.
//! - Cancellation is checked before every round and every batch and
//!   interrupts any sleep; a cancelled run still ends as `Completed`. A round
//!   interrupted by cancellation is not counted in `rounds_completed`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::batch;
use super::clock::{sleep_or_cancel, Clock, SystemClock};
use super::fetch::StatsFetcher;
use super::quota::{estimate, QuotaEstimate};
use super::retry::{RetryOutcome, RetryPolicy};
use super::sink::ObservationSink;
use crate::config::PollConfig;
use crate::error::{Error, Result};
use crate::models::{BatchResult, EntityId, Observation, PollPlan};

// ============================================================================
// Run State
// ============================================================================

/// Scheduler state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Planning,
    RoundActive,
    Sleeping,
    Completed,
    Aborted,
}

/// Mutable bookkeeping for one run, owned by the running scheduler
#[derive(Debug)]
pub struct RunState {
    pub phase: SchedulerPhase,
    pub start_time: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    /// Successful remote calls (one per fetched batch)
    pub calls_made: u64,
    /// Every remote call, including failed attempts
    pub remote_attempts: u64,
    pub rounds_completed: u64,
    pub batches: Vec<Vec<EntityId>>,
    pub batches_skipped: u64,
    pub observations_written: u64,
    pub write_failures: u64,
    pub last_round_at: Option<DateTime<Utc>>,
}

impl RunState {
    fn new(start_time: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            start_time,
            deadline,
            calls_made: 0,
            remote_attempts: 0,
            rounds_completed: 0,
            batches: Vec::new(),
            batches_skipped: 0,
            observations_written: 0,
            write_failures: 0,
            last_round_at: None,
        }
    }

    fn transition(&mut self, next: SchedulerPhase) {
        log::debug!("[scheduler] {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }
}

/// Final report of a run that got past planning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub estimate: QuotaEstimate,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub rounds_completed: u64,
    pub calls_made: u64,
    pub remote_attempts: u64,
    pub batches_skipped: u64,
    pub observations_written: u64,
    pub write_failures: u64,
    /// Stopped by the cancellation token rather than the deadline
    pub cancelled: bool,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Runs rounds of batched fetches until the deadline or cancellation
pub struct PollingScheduler {
    config: PollConfig,
    fetcher: Arc<dyn StatsFetcher>,
    sink: Arc<dyn ObservationSink>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl PollingScheduler {
    pub fn new(
        config: PollConfig,
        fetcher: Arc<dyn StatsFetcher>,
        sink: Arc<dyn ObservationSink>,
    ) -> Self {
        Self {
            config,
            fetcher,
            sink,
            clock: Arc::new(SystemClock),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run gracefully when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Estimate the plan under this scheduler's batch size and cost
    pub fn estimate(&self, plan: &PollPlan) -> Result<QuotaEstimate> {
        estimate(
            plan.entity_ids().len(),
            plan.interval_seconds(),
            plan.duration_hours(),
            self.config.max_batch_size,
            self.config.quota.cost_per_call,
        )
    }

    /// Execute the run described by `plan`
    ///
    /// # Errors
    ///
    /// - `InvalidConfiguration` if the configuration does not validate
    /// - `QuotaExceeded` if the estimate is over `max_calls`; nothing is
    ///   fetched or written in that case
    ///
    /// Fetch and persistence failures during the run are logged and counted
    /// in the summary, never returned.
    pub async fn run(&self, plan: &PollPlan) -> Result<RunSummary> {
        self.config.validate()?;

        let start = self.clock.now();
        let deadline = chrono::Duration::from_std(plan.window())
            .ok()
            .and_then(|window| start.checked_add_signed(window))
            .ok_or_else(|| {
                Error::config(format!(
                    "duration_hours {} is too large",
                    plan.duration_hours()
                ))
            })?;
        let mut state = RunState::new(start, deadline);

        // --- Planning ---
        state.transition(SchedulerPhase::Planning);
        let est = self.estimate(plan)?;
        log::info!(
            "[scheduler] Polling will start at {} UTC and stop at {} UTC",
            start.to_rfc3339(),
            deadline.to_rfc3339()
        );
        log::info!(
            "[scheduler] Planned calls: {} ({} round(s) x {} batch(es)); interval {}s; up to {} ids/call",
            est.total_calls,
            est.rounds,
            est.batches_per_round,
            plan.interval_seconds(),
            self.config.max_batch_size
        );

        if let Some(max) = plan.max_calls() {
            if !est.fits(Some(max)) {
                state.transition(SchedulerPhase::Aborted);
                log::error!(
                    "[scheduler] Aborting: planned calls {} > max_calls {}",
                    est.total_calls,
                    max
                );
                return Err(Error::QuotaExceeded {
                    planned: est.total_calls,
                    max,
                });
            }
        }

        state.batches = batch::plan(plan.entity_ids(), self.config.max_batch_size)?;
        let retry = RetryPolicy::new(&self.config.retry)
            .with_clock(Arc::clone(&self.clock))
            .with_cancellation(self.cancel.clone());

        // --- Rounds ---
        let mut cancelled = false;
        while self.clock.now() < state.deadline {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            state.transition(SchedulerPhase::RoundActive);
            self.run_round(&mut state, &retry).await;
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if self.clock.now() >= state.deadline {
                break;
            }
            state.transition(SchedulerPhase::Sleeping);
            log::info!(
                "[scheduler] Sleeping {}s until next poll interval...",
                plan.interval_seconds()
            );
            if !sleep_or_cancel(self.clock.as_ref(), plan.interval(), &self.cancel).await {
                cancelled = true;
                break;
            }
        }

        state.transition(SchedulerPhase::Completed);
        if cancelled {
            log::info!("[scheduler] Run cancelled; stopping gracefully");
        } else {
            log::info!("[scheduler] Polling window complete.");
        }

        Ok(RunSummary {
            estimate: est,
            started_at: state.start_time,
            finished_at: self.clock.now(),
            rounds_completed: state.rounds_completed,
            calls_made: state.calls_made,
            remote_attempts: state.remote_attempts,
            batches_skipped: state.batches_skipped,
            observations_written: state.observations_written,
            write_failures: state.write_failures,
            cancelled,
        })
    }

    /// One pass over every batch, stamped with a single round timestamp
    async fn run_round(&self, state: &mut RunState, retry: &RetryPolicy) {
        let round_at = self.round_timestamp(state);
        state.last_round_at = Some(round_at);
        let total = state.batches.len();

        let mut interrupted = false;
        for index in 0..total {
            if self.clock.now() >= state.deadline {
                log::info!(
                    "[scheduler] Deadline reached mid-round; skipping {} remaining batch(es)",
                    total - index
                );
                break;
            }
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let batch = &state.batches[index];
            let fetcher = self.fetcher.as_ref();
            let outcome = retry.execute(|| fetcher.fetch_stats(batch)).await;
            state.remote_attempts += u64::from(outcome.attempts());

            let result = match outcome {
                RetryOutcome::Success { value, .. } => {
                    state.calls_made += 1;
                    BatchResult::Fetched(value)
                }
                RetryOutcome::Exhausted { attempts, last_error } => BatchResult::Failed {
                    batch_index: index,
                    entity_ids: batch.clone(),
                    attempts,
                    error: last_error,
                },
                RetryOutcome::Fatal { attempts, error } => BatchResult::Failed {
                    batch_index: index,
                    entity_ids: batch.clone(),
                    attempts,
                    error,
                },
                RetryOutcome::Cancelled { .. } => {
                    log::info!(
                        "[scheduler] Cancelled during backoff for batch {}/{}",
                        index + 1,
                        total
                    );
                    interrupted = true;
                    break;
                }
            };

            match result {
                BatchResult::Fetched(records) => {
                    for entity_id in batch {
                        let Some(stats) = records.get(entity_id) else {
                            log::debug!("[scheduler] No record returned for {}", entity_id);
                            continue;
                        };
                        let observation = Observation::new(entity_id.clone(), round_at, stats.clone());
                        match self.sink.append(&observation).await {
                            Ok(()) => state.observations_written += 1,
                            Err(e) => {
                                state.write_failures += 1;
                                log::error!("[scheduler] Failed to persist {}: {}", entity_id, e);
                            }
                        }
                    }
                    log::info!(
                        "[{}] Polled batch {}/{} ({} ids) - call #{}",
                        round_at.to_rfc3339(),
                        index + 1,
                        total,
                        batch.len(),
                        state.calls_made
                    );
                }
                BatchResult::Failed {
                    batch_index,
                    entity_ids,
                    attempts,
                    error,
                } => {
                    state.batches_skipped += 1;
                    log::warn!(
                        "[scheduler] Skipping batch {} ({} ids, first {}) for this round after {} attempt(s): {}",
                        batch_index + 1,
                        entity_ids.len(),
                        entity_ids.first().map(String::as_str).unwrap_or("-"),
                        attempts,
                        error
                    );
                }
            }
        }

        // Rounds cut short by the deadline still count; cancelled ones do not
        if !interrupted {
            state.rounds_completed += 1;
        }
    }

    /// Current time, forced strictly past the previous round's timestamp
    fn round_timestamp(&self, state: &RunState) -> DateTime<Utc> {
        let now = self.clock.now();
        match state.last_round_at {
            Some(prev) if now <= prev => prev + chrono::Duration::milliseconds(1),
            _ => now,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
