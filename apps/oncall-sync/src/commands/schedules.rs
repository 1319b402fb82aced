//! Schedules command - List upstream schedules

use anyhow::Context;
use clap::Args;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use xavyo_connector_incidentio::IncidentIoClient;

use crate::config::Config;

/// Arguments for the schedules command
#[derive(Args)]
pub struct SchedulesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the schedules command
pub async fn execute(
    args: SchedulesArgs,
    config: Config,
    cancel: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let client =
        IncidentIoClient::new(config.incidentio).context("failed to build incident.io client")?;
    let schedules = client.list_all_schedules(&cancel).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&schedules)?);
        return Ok(ExitCode::SUCCESS);
    }

    if schedules.is_empty() {
        println!("No schedules found.");
        return Ok(ExitCode::SUCCESS);
    }

    let width = schedules.iter().map(|s| s.id.len()).max().unwrap_or(2).max(2);
    println!("{:<width$}  {:<20}  NAME", "ID", "TIMEZONE");
    for schedule in &schedules {
        println!(
            "{:<width$}  {:<20}  {}",
            schedule.id, schedule.timezone, schedule.name
        );
    }
    Ok(ExitCode::SUCCESS)
}
