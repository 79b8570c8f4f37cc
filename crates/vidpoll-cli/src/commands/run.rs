//! Run command
//!
//! Shows the plan, asks for confirmation, then polls until the window closes
//! or Ctrl-C is pressed.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use super::{resolve_plan, warn_short_ids, Context, PollArgs};
use crate::output::{print_info, print_single, print_success, OutputFormat};
use vidpoll_core::{
    discover_credentials, CsvSink, PollingScheduler, RunSummary, YouTubeStatsFetcher,
};

/// Word the operator must type to start a run
const CONFIRM_WORD: &str = "YES";

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub poll: PollArgs,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Summary row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "Rounds")]
    pub rounds: u64,
    #[tabled(rename = "Calls")]
    pub calls: String,
    #[tabled(rename = "Attempts")]
    pub attempts: u64,
    #[tabled(rename = "Skipped batches")]
    pub skipped: u64,
    #[tabled(rename = "Rows written")]
    pub written: u64,
    #[tabled(rename = "Write failures")]
    pub write_failures: u64,
    #[tabled(rename = "Stopped by")]
    pub stopped_by: String,
}

impl From<&RunSummary> for SummaryRow {
    fn from(s: &RunSummary) -> Self {
        Self {
            rounds: s.rounds_completed,
            calls: format!("{} / {}", s.calls_made, s.estimate.total_calls),
            attempts: s.remote_attempts,
            skipped: s.batches_skipped,
            written: s.observations_written,
            write_failures: s.write_failures,
            stopped_by: if s.cancelled { "cancel" } else { "deadline" }.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, args: RunArgs, cancel: CancellationToken) -> Result<()> {
    let (config, plan) = resolve_plan(ctx, &args.poll)?;
    let creds = discover_credentials(args.poll.credentials.as_deref())?;
    warn_short_ids(&plan);

    let fetcher = Arc::new(YouTubeStatsFetcher::new(creds.access_token));
    let sink = CsvSink::new(vidpoll_core::utils::expand_path(&config.output_dir));
    let output_dir = sink.root().to_path_buf();
    let cost = config.quota.cost_per_call;
    let scheduler = PollingScheduler::new(config, fetcher, Arc::new(sink.clone()))
        .with_cancellation(cancel);

    let est = scheduler.estimate(&plan)?;
    let within_budget = est.fits(plan.max_calls());

    // An over-budget plan goes straight to the scheduler, which refuses it
    if within_budget && !args.yes {
        print_info("About to start polling with parameters:", false);
        print_info(&format!("  videos: {}", plan.entity_ids().join(", ")), false);
        print_info(
            &format!(
                "  interval: {}s   hours: {}",
                plan.interval_seconds(),
                plan.duration_hours()
            ),
            false,
        );
        print_info(
            &format!(
                "  estimated calls: {}   estimated quota units: {} ({} per call)",
                est.total_calls, est.quota_units, cost
            ),
            false,
        );
        print_info(&format!("  output directory: {}", output_dir.display()), false);
        print_info(
            "Important: confirm your quota in the Google Cloud console before proceeding.",
            false,
        );
        if !confirm()? {
            print_info("Cancelled by user.", false);
            return Ok(());
        }
    }

    if within_budget {
        sink.ensure_dirs(plan.entity_ids())?;
    }

    let summary = scheduler.run(&plan).await?;

    match ctx.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Table => {
            print_single(&SummaryRow::from(&summary), ctx.format)?;
            if summary.cancelled {
                print_info("Polling stopped early.", ctx.quiet);
            } else {
                print_success("Polling window complete.", ctx.quiet);
            }
            print_info(&format!("Data saved under {}", output_dir.display()), ctx.quiet);
        }
    }
    Ok(())
}

/// Ask on stdin; only the exact confirmation word proceeds
fn confirm() -> Result<bool> {
    print!("Type {} to proceed (or anything else to cancel): ", CONFIRM_WORD);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(is_confirmation(&line))
}

fn is_confirmation(input: &str) -> bool {
    input.trim() == CONFIRM_WORD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirmation_is_exact() {
        assert!(is_confirmation("YES\n"));
        assert!(is_confirmation("  YES  "));
        assert!(!is_confirmation("yes"));
        assert!(!is_confirmation("Y"));
        assert!(!is_confirmation(""));
    }
}
