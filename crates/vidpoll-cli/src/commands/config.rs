//! Config commands
//!
//! Commands for inspecting the effective configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::print_output;
use vidpoll_core::auth::{credential_candidates, find_credentials_path};
use vidpoll_core::config::CONFIG_ENV;
use vidpoll_core::PollConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the default configuration as JSON (a starting point for --config)
    Defaults,
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
        ConfigAction::Defaults => {
            println!("{}", serde_json::to_string_pretty(&PollConfig::default())?);
            Ok(())
        }
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?;
    let source = config_source(ctx);
    print_output(&config_rows(&config, &source), ctx.format)?;
    Ok(())
}

/// Where the effective configuration was read from
fn config_source(ctx: &Context) -> String {
    if let Some(path) = &ctx.config_path {
        return path.display().to_string();
    }
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        return p;
    }
    match PollConfig::default_path() {
        Some(path) if path.exists() => path.display().to_string(),
        _ => "default".to_string(),
    }
}

fn config_rows(config: &PollConfig, source: &str) -> Vec<ConfigRow> {
    let row = |key: &str, value: String| ConfigRow {
        key: key.to_string(),
        value,
        source: source.to_string(),
    };

    let mut rows = vec![
        row("interval_seconds", config.interval_seconds.to_string()),
        row("duration_hours", config.duration_hours.to_string()),
        row("output_dir", config.output_dir.display().to_string()),
        row(
            "max_calls",
            config
                .max_calls
                .map(|m| m.to_string())
                .unwrap_or_else(|| "none".to_string()),
        ),
        row("max_batch_size", config.max_batch_size.to_string()),
        row("retry.max_retries", config.retry.max_retries.to_string()),
        row(
            "retry.initial_backoff_seconds",
            config.retry.initial_backoff_seconds.to_string(),
        ),
        row("quota.cost_per_call", config.quota.cost_per_call.to_string()),
    ];

    let creds: Option<PathBuf> = find_credentials_path(&credential_candidates(None));
    rows.push(ConfigRow {
        key: "credentials".to_string(),
        value: creds
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "Not found".to_string()),
        source: "detected".to_string(),
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rows_cover_every_setting() {
        let rows = config_rows(&PollConfig::default(), "default");
        let keys: Vec<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "interval_seconds",
                "duration_hours",
                "output_dir",
                "max_calls",
                "max_batch_size",
                "retry.max_retries",
                "retry.initial_backoff_seconds",
                "quota.cost_per_call",
                "credentials",
            ]
        );
        assert_eq!(rows[0].value, "60");
        assert_eq!(rows[3].value, "none");
        assert_eq!(rows[0].source, "default");
    }
}
