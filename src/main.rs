mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::sync::SyncArgs;

#[derive(Parser)]
#[command(name = "busyblock")]
#[command(about = "Mirror events from one calendar as busy blocks on another")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Book a busy block on the target for every source event in the window
    Sync {
        /// First day of the window (YYYY-MM-DD, default today)
        #[arg(long)]
        from: Option<String>,

        /// Day after the last day of the window (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        /// Window length in days when --to is not given
        #[arg(long)]
        days: Option<i64>,

        /// Overlap tolerance (e.g. "60s", "1m 30s")
        #[arg(long)]
        buffer: Option<String>,

        #[arg(long)]
        source_account: Option<String>,

        #[arg(long)]
        target_account: Option<String>,

        /// Calendar folder name used on both accounts
        #[arg(short, long)]
        calendar: Option<String>,

        /// Use this config file instead of the default
        #[arg(long)]
        config: Option<PathBuf>,

        /// Show every event and debug logs
        #[arg(short, long)]
        verbose: bool,
    },
    /// Show the effective configuration
    Config {
        /// Only print the config file path
        #[arg(long)]
        path: bool,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            from,
            to,
            days,
            buffer,
            source_account,
            target_account,
            calendar,
            config,
            verbose,
        } => {
            init_logging(verbose);
            commands::sync::run(SyncArgs {
                from,
                to,
                days,
                buffer,
                source_account,
                target_account,
                calendar,
                config,
                verbose,
            })
            .await
        }
        Commands::Config { path, config } => {
            init_logging(false);
            commands::config::run(config.as_deref(), path)
        }
    }
}
