//! Preflight command
//!
//! One sample call plus the full-run estimate, without writing anything.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use super::{resolve_plan, warn_short_ids, Context, PollArgs};
use crate::output::{print_info, print_output, OutputFormat};
use vidpoll_core::{discover_credentials, Observation, PreflightGate, YouTubeStatsFetcher};

/// Sample row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SampleRow {
    #[tabled(rename = "Video")]
    pub video_id: String,
    #[tabled(rename = "Views")]
    pub views: String,
    #[tabled(rename = "Likes")]
    pub likes: String,
    #[tabled(rename = "Comments")]
    pub comments: String,
    #[tabled(rename = "Published")]
    pub published_at: String,
    #[tabled(rename = "Title")]
    pub title: String,
}

impl From<&Observation> for SampleRow {
    fn from(o: &Observation) -> Self {
        let count = |v: Option<u64>| v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        Self {
            video_id: o.entity_id.clone(),
            views: count(o.stats.view_count),
            likes: count(o.stats.like_count),
            comments: count(o.stats.comment_count),
            published_at: o.stats.published_at.clone().unwrap_or_default(),
            title: o.stats.title.clone().unwrap_or_default(),
        }
    }
}

pub async fn execute(ctx: &Context, args: PollArgs, cancel: CancellationToken) -> Result<()> {
    let (config, plan) = resolve_plan(ctx, &args)?;
    let creds = discover_credentials(args.credentials.as_deref())?;
    warn_short_ids(&plan);

    let fetcher = Arc::new(YouTubeStatsFetcher::new(creds.access_token));
    let cost = config.quota.cost_per_call;
    let report = PreflightGate::new(config, fetcher)
        .with_cancellation(cancel)
        .sample(&plan)
        .await?;

    if ctx.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_info(
        &format!(
            "Preflight: one videos.list call for {} sample video(s)",
            report.sampled_ids.len()
        ),
        ctx.quiet,
    );
    let rows: Vec<SampleRow> = report.observations.iter().map(SampleRow::from).collect();
    print_output(&rows, ctx.format)?;

    if !report.missing.is_empty() {
        print_info(
            &format!("Not returned by the API: {}", report.missing.join(", ")),
            ctx.quiet,
        );
    }
    if report.truncated > 0 {
        print_info(
            &format!("{} more video(s) were not sampled", report.truncated),
            ctx.quiet,
        );
    }

    let est = &report.estimate;
    println!();
    println!(
        "Estimated total calls for this run: {} ({} round(s) x {} call(s))",
        est.total_calls, est.rounds, est.batches_per_round
    );
    println!(
        "Estimated quota units (assuming {} per call): {}",
        cost, est.quota_units
    );
    if let Some(max) = plan.max_calls() {
        if !est.fits(Some(max)) {
            println!(
                "{}",
                colored::Colorize::yellow(
                    format!("This plan exceeds --max-calls {} and would be aborted.", max).as_str()
                )
            );
        }
    }
    print_info(
        "If you are comfortable, start polling with `vidpoll run`. Also verify your quota in the Google Cloud console.",
        ctx.quiet,
    );
    Ok(())
}
