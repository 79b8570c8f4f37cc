//! vidpoll CLI - budgeted video statistics polling
//!
//! A command-line interface for sampling and periodically polling YouTube
//! video statistics into per-video CSV logs.

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "vidpoll")]
#[command(author, version, about = "Budgeted video statistics polling CLI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, value_enum, default_value_t = output::OutputFormat::Table)]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// JSON config file (or set VIDPOLL_CONFIG env var)
    #[arg(long, env = "VIDPOLL_CONFIG", global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Make one sample call and estimate the cost of a run
    Preflight(commands::PollArgs),

    /// Poll statistics until the window closes
    Run(commands::run::RunArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();

    // Ctrl-C stops the run at the next suspension point
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupt received; stopping after the current call");
            on_signal.cancel();
        }
    });

    let ctx = commands::Context {
        format: cli.format,
        quiet: cli.quiet,
        config_path: cli.config,
    };

    let result = match cli.command {
        Commands::Preflight(args) => commands::preflight::execute(&ctx, args, cancel).await,
        Commands::Run(args) => commands::run::execute(&ctx, args, cancel).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("Error: {:#}", e));
            exit_code(&e)
        }
    }
}

/// 2 when the run was refused before any API call, 1 otherwise
fn exit_code(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<vidpoll_core::Error>() {
        Some(e) if e.is_preflight_fatal() => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}
