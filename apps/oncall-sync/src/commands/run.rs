//! Run command - One reconciliation pass over a bindings file

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use xavyo_connector_incidentio::IncidentIoClient;
use xavyo_oncall_sync::ReconciliationEngine;

use crate::bindings::BindingsFile;
use crate::config::Config;

/// Arguments for the run command
#[derive(Args)]
pub struct RunArgs {
    /// Path to the JSON bindings file
    #[arg(long, short, env = "ONCALL_SYNC_BINDINGS")]
    pub bindings: PathBuf,

    /// Compute changes without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Write refreshed memberships and schedule names back to the bindings file
    #[arg(long, conflicts_with = "dry_run")]
    pub write_back: bool,
}

/// Execute the run command
pub async fn execute(
    args: RunArgs,
    config: Config,
    cancel: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let mut bindings = BindingsFile::load(&args.bindings)?;

    let mut reconciliation = bindings.reconciliation.clone();
    if args.dry_run {
        reconciliation.dry_run = true;
    }
    if let Some(max_concurrency) = config.max_concurrency {
        reconciliation.max_concurrency = max_concurrency;
    }

    let client =
        IncidentIoClient::new(config.incidentio).context("failed to build incident.io client")?;
    let groups = bindings.group_store().await;
    let resolver = bindings.resolver(&client, &reconciliation).await;
    let engine = ReconciliationEngine::new(client.clone(), resolver, groups.clone(), reconciliation)?;

    let report = engine.run(&bindings.tracked_schedules, &cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.summary());
    }

    let metrics = client.metrics().await;
    info!(
        requests_sent = metrics.requests_sent,
        rate_limited = metrics.rate_limited_count,
        retries = metrics.retry_count,
        failures = metrics.failures,
        "incident.io request metrics"
    );

    if args.write_back {
        bindings.apply_report(&report, &groups).await;
        bindings.save(&args.bindings)?;
        info!(path = %args.bindings.display(), "Bindings file updated");
    }

    match report.outcome() {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            warn!(error = %e, "Reconciliation finished with failures");
            Ok(ExitCode::from(1))
        }
    }
}
