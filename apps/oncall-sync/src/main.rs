//! oncall-sync - Mirror incident.io on-call schedules into xavyo groups
//!
//! Exit codes:
//! - 0: Success
//! - 1: One or more schedules failed (report printed)
//! - 2: Fatal error (configuration, schedule inventory, cancellation)

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

mod bindings;
mod commands;
mod config;
mod logging;

use config::Config;

/// oncall-sync - On-call group synchronization
#[derive(Parser)]
#[command(name = "oncall-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile tracked schedules into their groups once
    Run(commands::run::RunArgs),

    /// List schedules visible to the API key
    Schedules(commands::schedules::SchedulesArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };
    logging::init_logging(&config.rust_log, config.log_format);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            signal_cancel.cancel();
        }
    });

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, config, cancel).await,
        Commands::Schedules(args) => commands::schedules::execute(args, config, cancel).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "oncall-sync failed");
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}
