//! Preflight sampling
//!
//! Makes exactly one fetch for the first batch of entities and reports what a
//! full run would cost, so an operator can check credentials and budget
//! before committing. Nothing is persisted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::clock::{Clock, SystemClock};
use super::fetch::StatsFetcher;
use super::quota::{estimate, QuotaEstimate};
use super::retry::{RetryOutcome, RetryPolicy};
use crate::config::{PollConfig, MAX_BATCH};
use crate::error::{Error, Result};
use crate::models::{EntityId, Observation, PollPlan};

/// Result of a preflight sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreflightReport {
    /// Entities included in the sample call (at most one batch)
    pub sampled_ids: Vec<EntityId>,
    /// Entities passed in but left out of the sample
    pub truncated: usize,
    pub sampled_at: DateTime<Utc>,
    /// One observation per entity the API reported, in request order
    pub observations: Vec<Observation>,
    /// Sampled entities the API did not report (deleted, private, mistyped)
    pub missing: Vec<EntityId>,
    /// Estimate for the full run
    pub estimate: QuotaEstimate,
}

/// One-shot credential and budget check
pub struct PreflightGate {
    config: PollConfig,
    fetcher: Arc<dyn StatsFetcher>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl PreflightGate {
    pub fn new(config: PollConfig, fetcher: Arc<dyn StatsFetcher>) -> Self {
        Self {
            config,
            fetcher,
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

    /// Fetch the first batch once and estimate the full plan
    ///
    /// # Errors
    ///
    /// Returns `Error::Fetch` if the sample call fails (after the default
    /// retries for transient errors), `Error::Cancelled` if cancelled during
    /// backoff.
    pub async fn sample(&self, plan: &PollPlan) -> Result<PreflightReport> {
        self.config.validate()?;

        let est = estimate(
            plan.entity_ids().len(),
            plan.interval_seconds(),
            plan.duration_hours(),
            self.config.max_batch_size,
            self.config.quota.cost_per_call,
        )?;

        let cap = self.config.max_batch_size.min(MAX_BATCH);
        let ids = plan.entity_ids();
        let sampled_ids: Vec<EntityId> = ids.iter().take(cap).cloned().collect();
        let truncated = ids.len() - sampled_ids.len();
        if truncated > 0 {
            log::debug!(
                "[preflight] Sampling first {} of {} ids",
                sampled_ids.len(),
                ids.len()
            );
        }

        log::info!(
            "[preflight] Making one {} call for {} sample id(s)",
            self.fetcher.fetcher_id(),
            sampled_ids.len()
        );

        let retry = RetryPolicy::new(&self.config.retry)
            .with_clock(Arc::clone(&self.clock))
            .with_cancellation(self.cancel.clone());
        let sampled_at = self.clock.now();
        let fetcher = self.fetcher.as_ref();
        let batch = sampled_ids.as_slice();

        let records = match retry.execute(|| fetcher.fetch_stats(batch)).await {
            RetryOutcome::Success { value, .. } => value,
            RetryOutcome::Exhausted { last_error, .. } => {
                log::error!("[preflight] Sample call failed after retries: {}", last_error);
                return Err(Error::Fetch(last_error));
            }
            RetryOutcome::Fatal { error, .. } => {
                log::error!("[preflight] Sample call failed: {}", error);
                return Err(Error::Fetch(error));
            }
            RetryOutcome::Cancelled { .. } => return Err(Error::Cancelled),
        };

        let mut observations = Vec::new();
        let mut missing = Vec::new();
        for id in &sampled_ids {
            match records.get(id) {
                Some(stats) => observations.push(Observation::new(id.clone(), sampled_at, stats.clone())),
                None => missing.push(id.clone()),
            }
        }

        log::info!(
            "[preflight] Estimated total calls: {}; quota units: {}",
            est.total_calls,
            est.quota_units
        );

        Ok(PreflightReport {
            sampled_ids,
            truncated,
            sampled_at,
            observations,
            missing,
            estimate: est,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StatsRecord;
    use crate::services::clock::ManualClock;
    use crate::services::fetch::FetchError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingFetcher {
        requests: Mutex<Vec<Vec<EntityId>>>,
        response: std::result::Result<(), FetchError>,
    }

    impl RecordingFetcher {
        fn ok() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Ok(()),
            }
        }

        fn failing(error: FetchError) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                response: Err(error),
            }
        }

        fn requests(&self) -> Vec<Vec<EntityId>> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StatsFetcher for RecordingFetcher {
        fn fetcher_id(&self) -> &'static str {
            "recording"
        }

        async fn fetch_stats(
            &self,
            batch: &[EntityId],
        ) -> std::result::Result<HashMap<EntityId, StatsRecord>, FetchError> {
            self.requests.lock().unwrap().push(batch.to_vec());
            self.response.clone()?;
            Ok(batch
                .iter()
                .filter(|id| !id.starts_with("missing"))
                .map(|id| {
                    let stats = StatsRecord {
                        view_count: Some(42),
                        title: Some(format!("title of {}", id)),
                        ..Default::default()
                    };
                    (id.clone(), stats)
                })
                .collect())
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ))
    }

    fn many_ids(n: usize) -> Vec<EntityId> {
        (0..n).map(|i| format!("video{:06}", i)).collect()
    }

    #[tokio::test]
    async fn test_sample_truncates_to_one_batch() {
        let fetcher = Arc::new(RecordingFetcher::ok());
        let plan = PollPlan::new(many_ids(120), 60, 1.0, None).unwrap();

        let report = PreflightGate::new(PollConfig::default(), fetcher.clone())
            .with_clock(clock())
            .sample(&plan)
            .await
            .unwrap();

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].len(), 50);
        assert_eq!(requests[0][0], "video000000");
        assert_eq!(report.sampled_ids.len(), 50);
        assert_eq!(report.truncated, 70);
        assert_eq!(report.observations.len(), 50);
        assert_eq!(report.estimate.total_calls, 180);
    }

    #[tokio::test]
    async fn test_sample_respects_smaller_batch_size() {
        let fetcher = Arc::new(RecordingFetcher::ok());
        let config = PollConfig {
            max_batch_size: 10,
            ..Default::default()
        };
        let plan = PollPlan::new(many_ids(25), 60, 1.0, None).unwrap();

        let report = PreflightGate::new(config, fetcher.clone())
            .with_clock(clock())
            .sample(&plan)
            .await
            .unwrap();

        assert_eq!(fetcher.requests()[0].len(), 10);
        assert_eq!(report.estimate.batches_per_round, 3);
    }

    #[tokio::test]
    async fn test_sample_reports_missing_ids() {
        let fetcher = Arc::new(RecordingFetcher::ok());
        let plan = PollPlan::new(
            vec!["present1".to_string(), "missing1".to_string()],
            60,
            1.0,
            None,
        )
        .unwrap();

        let report = PreflightGate::new(PollConfig::default(), fetcher)
            .with_clock(clock())
            .sample(&plan)
            .await
            .unwrap();

        assert_eq!(report.missing, vec!["missing1".to_string()]);
        assert_eq!(report.observations.len(), 1);
        assert_eq!(report.observations[0].stats.view_count, Some(42));
    }

    #[tokio::test]
    async fn test_sample_ignores_max_calls() {
        let fetcher = Arc::new(RecordingFetcher::ok());
        let plan = PollPlan::new(many_ids(120), 60, 1.0, Some(1)).unwrap();

        let report = PreflightGate::new(PollConfig::default(), fetcher.clone())
            .with_clock(clock())
            .sample(&plan)
            .await
            .unwrap();

        assert!(!report.estimate.fits(plan.max_calls()));
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fatal_failure_is_returned() {
        let fetcher = Arc::new(RecordingFetcher::failing(FetchError::from_status(
            401,
            "Invalid Credentials",
        )));
        let plan = PollPlan::new(many_ids(1), 60, 1.0, None).unwrap();
        let clock = clock();

        let err = PreflightGate::new(PollConfig::default(), fetcher.clone())
            .with_clock(clock.clone())
            .sample(&plan)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::Fatal { status: Some(401), .. })));
        assert_eq!(fetcher.requests().len(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_retried_then_returned() {
        let fetcher = Arc::new(RecordingFetcher::failing(FetchError::from_status(500, "backend")));
        let plan = PollPlan::new(many_ids(1), 60, 1.0, None).unwrap();
        let clock = clock();

        let err = PreflightGate::new(PollConfig::default(), fetcher.clone())
            .with_clock(clock.clone())
            .sample(&plan)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Fetch(FetchError::Transient { .. })));
        assert_eq!(fetcher.requests().len(), 6);
        assert_eq!(clock.total_slept(), Duration::from_secs(126));
    }

    #[tokio::test]
    async fn test_cancelled_during_backoff() {
        let fetcher = Arc::new(RecordingFetcher::failing(FetchError::transient("reset")));
        let plan = PollPlan::new(many_ids(1), 60, 1.0, None).unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = PreflightGate::new(PollConfig::default(), fetcher)
            .with_clock(clock())
            .with_cancellation(token)
            .sample(&plan)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
