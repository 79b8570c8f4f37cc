//! Bounded exponential backoff for a single remote fetch
//!
//! A batch fetch is attempted up to `max_retries` times. After every transient
//! failure the policy sleeps `initial_backoff * 2^(attempt - 1)` (2, 4, 8, 16,
//! 32, 64 seconds with the defaults), so an operation that never recovers costs
//! exactly `max_retries` attempts and 126 seconds of backoff before the batch
//! is given up. A fatal failure returns after the first attempt.
//!
//! Backoff sleeps race the run's cancellation token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::clock::{sleep_or_cancel, Clock, SystemClock};
use super::fetch::FetchError;
use crate::config::RetryConfig;

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    /// Every attempt failed transiently
    Exhausted { attempts: u32, last_error: FetchError },
    /// A non-transient failure; not retried
    Fatal { attempts: u32, error: FetchError },
    /// The run was cancelled during a backoff sleep
    Cancelled { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::Fatal { attempts, .. }
            | RetryOutcome::Cancelled { attempts } => *attempts,
        }
    }
}

/// Retry executor; one instance per run
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            initial_backoff: config.initial_backoff(),
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

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay after the given 1-based failed attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63);
        let factor = 2f64.powi(exponent as i32);
        Duration::try_from_secs_f64(self.initial_backoff.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }

    /// Run `operation` until it succeeds, fails fatally, runs out of attempts,
    /// or the run is cancelled.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Err(e) => e,
            };

            if !error.is_transient() {
                log::warn!("[retry] Non-transient error on attempt {}: {}", attempt, error);
                return RetryOutcome::Fatal {
                    attempts: attempt,
                    error,
                };
            }

            let wait = self.backoff_for(attempt);
            log::warn!(
                "[retry] {} on attempt {}/{}. Backing off {:.1}s",
                error,
                attempt,
                self.max_retries,
                wait.as_secs_f64()
            );
            if !sleep_or_cancel(self.clock.as_ref(), wait, &self.cancel).await {
                log::info!("[retry] Cancelled during backoff after {} attempt(s)", attempt);
                return RetryOutcome::Cancelled { attempts: attempt };
            }

            if attempt >= self.max_retries {
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: error,
                };
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
