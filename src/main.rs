//! Binary entry point for the engagement exporter CLI.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use engagement_exporter::cli::{Cli, Commands, RunSummary};
use engagement_exporter::shutdown::StopSignal;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber; `LOG_FORMAT=json` switches to JSON
/// output.
fn init_tracing() {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("engagement_exporter=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();

    // The first Ctrl+C triggers graceful cancellation; unfinished
    // identifiers are reported as cancelled.
    let stop = StopSignal::shared();
    tokio::spawn({
        let stop = stop.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl+C received - cancelling run...");
                stop.trigger();
            }
        }
    });

    let result: anyhow::Result<RunSummary> = match cli.command {
        Commands::Fetch(ref args) => args
            .execute(stop)
            .await
            .context("fetch command failed"),
        Commands::Generate(ref args) => args.execute().context("generate command failed"),
    };

    match result {
        Ok(summary) => {
            summary.print();
            if summary.failed > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(error) => {
            error!("command failed: {error:#}");
            ExitCode::FAILURE
        }
    }
}
