//! CLI error aggregation.

use crate::exporter::SchedulerError;
use crate::fetcher::FetcherError;
use crate::input::InputError;
use crate::metrics::MetricsError;
use crate::output::OutputError;

/// Everything that can fail at the command boundary.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Reading identifiers failed.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// The fetch client could not be constructed.
    #[error("fetcher error: {0}")]
    Fetcher(#[from] FetcherError),

    /// The run aborted inside the scheduler.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Writing an artifact failed.
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// The metrics exporter could not be installed.
    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    /// An argument combination was rejected after parsing.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
