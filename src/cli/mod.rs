//! CLI command implementations.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

pub mod error;
mod fetch;
mod generate;

pub use error::CliError;
pub use fetch::FetchArgs;
pub use generate::GenerateArgs;

/// Engagement exporter CLI.
#[derive(Parser, Debug)]
#[command(name = "engagement-exporter")]
#[command(about = "Export engagement JSON documents for IDs listed in a CSV file", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch one JSON document per identifier from the HTTP API
    Fetch(FetchArgs),

    /// Write placeholder documents for every identifier, no network activity
    Generate(GenerateArgs),
}

/// Input/output flags shared by both commands.
#[derive(Args, Debug, Clone)]
pub struct IoArgs {
    /// CSV file with engagement IDs
    #[arg(long, default_value = "Engagement ID.csv")]
    pub csv: PathBuf,

    /// Directory for per-ID JSON files
    #[arg(long, default_value = "engagement_jsons")]
    pub output_dir: PathBuf,

    /// Also write a JSONL file (one JSON document per line)
    #[arg(long)]
    pub jsonl: bool,

    /// Also write a combined JSON array file (may be large)
    #[arg(long)]
    pub combined: bool,

    /// Skip identifiers that already have a parseable output file
    #[arg(long)]
    pub skip_existing: bool,

    /// Process only the first N identifiers
    #[arg(long)]
    pub limit: Option<usize>,
}

/// End-of-run tallies surfaced to the user and the exit status.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    /// Identifiers that ended with a payload artifact.
    pub succeeded: usize,
    /// Identifiers that ended failed or cancelled.
    pub failed: usize,
    /// Identifiers not fetched because their artifact already existed.
    pub skipped: usize,
    /// Wall time of the whole command.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Print the human-readable end-of-run summary.
    pub fn print(&self) {
        println!(
            "\nDone in {}: {} succeeded, {} failed, {} skipped",
            crate::exporter::progress::format_duration(self.elapsed),
            self.succeeded,
            self.failed,
            self.skipped,
        );
    }
}
