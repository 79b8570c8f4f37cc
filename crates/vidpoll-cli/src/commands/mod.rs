//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod config;
pub mod preflight;
pub mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::output::OutputFormat;
use vidpoll_core::{EntityId, PollConfig, PollPlan};

/// Shared context for all commands
pub struct Context {
    pub format: OutputFormat,
    pub quiet: bool,
    /// Config file given with `--config` / `VIDPOLL_CONFIG`
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Load the effective configuration before any flag overrides
    pub fn load_config(&self) -> Result<PollConfig> {
        Ok(PollConfig::load(self.config_path.as_deref())?)
    }
}

/// Options shared by `preflight` and `run`
#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// One or more video IDs to monitor
    #[arg(long = "video", short = 'v', required = true, num_args = 1..)]
    pub videos: Vec<String>,

    /// Poll interval in seconds
    #[arg(long)]
    pub interval: Option<u64>,

    /// How many hours to poll each video
    #[arg(long, alias = "t0-hours")]
    pub hours: Option<f64>,

    /// Abort the run if the estimated number of calls exceeds this
    #[arg(long)]
    pub max_calls: Option<u64>,

    /// Maximum IDs per API call
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Output data directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Credentials file (or set VIDPOLL_CREDENTIALS)
    #[arg(long)]
    pub credentials: Option<PathBuf>,
}

impl PollArgs {
    /// Apply flag overrides on top of a loaded configuration
    pub fn apply(&self, mut config: PollConfig) -> PollConfig {
        if let Some(interval) = self.interval {
            config.interval_seconds = interval;
        }
        if let Some(hours) = self.hours {
            config.duration_hours = hours;
        }
        if self.max_calls.is_some() {
            config.max_calls = self.max_calls;
        }
        if let Some(size) = self.batch_size {
            config.max_batch_size = size;
        }
        if let Some(dir) = &self.out_dir {
            config.output_dir = dir.clone();
        }
        config
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.videos.iter().map(|v| v.trim().to_string()).collect()
    }
}

/// Resolve configuration and plan for a polling command
pub fn resolve_plan(ctx: &Context, args: &PollArgs) -> Result<(PollConfig, PollPlan)> {
    let config = args.apply(ctx.load_config()?);
    let plan = config.plan(args.entity_ids())?;
    Ok((config, plan))
}

/// Warn about IDs that look truncated (real video IDs are 11 characters)
pub fn warn_short_ids(plan: &PollPlan) {
    let short = plan.suspicious_ids();
    if !short.is_empty() {
        log::warn!(
            "Some video IDs look short ({}). Make sure you passed proper YouTube video IDs (usually 11+ chars).",
            short.join(", ")
        );
    }
}
