//! Quota planning module
//!
//! The YouTube Data API charges quota units per call, and an operator
//! approves a run based on how many calls it will make. This module
//! computes that number before the first call goes out.
//!
//! # Usage
//!
//! ```ignore
//! use vidpoll_core::services::quota::estimate;
//!
//! // 120 videos, every 60s, for one hour, 50 ids per call
//! let est = estimate(120, 60, 1.0, 50, 1)?;
//! assert_eq!(est.total_calls, 180);
//! ```

pub mod estimator;

pub use estimator::{estimate, estimate_rounds, QuotaEstimate};
