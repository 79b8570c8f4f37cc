//! Services module

pub mod batch;
pub mod clock;
pub mod fetch;
pub mod preflight;
pub mod quota;
pub mod retry;
pub mod scheduler;
pub mod sink;

pub use clock::{sleep_or_cancel, Clock, ManualClock, SystemClock};
pub use fetch::{FetchError, StatsFetcher, YouTubeStatsFetcher};
pub use preflight::{PreflightGate, PreflightReport};
pub use quota::{estimate, estimate_rounds, QuotaEstimate};
pub use retry::{RetryOutcome, RetryPolicy};
pub use scheduler::{PollingScheduler, RunSummary, SchedulerPhase};
pub use sink::{CsvSink, MemorySink, ObservationSink};
