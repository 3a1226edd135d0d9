//! # Engagement Exporter Library
//!
//! A bounded-concurrency, rate-limited batch fetcher for engagement records.
//! Given a list of record identifiers, it retrieves one JSON document per
//! identifier from a remote HTTP API while respecting a global requests-per-second
//! ceiling and a fixed worker cap, retrying transient failures with exponential
//! backoff across a multi-day window, and accounting for every identifier's
//! outcome exactly once.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use engagement_exporter::exporter::{ExportConfig, Scheduler};
//! use engagement_exporter::fetcher::{Credential, HttpRecordFetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExportConfig::default();
//! let fetcher = HttpRecordFetcher::new(
//!     "https://api.hubapi.com/engagements/v1/engagements/{id}",
//!     Credential::Bearer("token".into()),
//!     "engagement-exporter/1.0",
//!     config.request_timeout,
//! )?;
//!
//! let report = Scheduler::new(config, Arc::new(fetcher))?
//!     .run(vec!["101".into(), "102".into()])
//!     .await?;
//!
//! println!("{} succeeded, {} failed", report.succeeded.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`input`] - Identifier sources (CSV column extraction)
//! - [`fetcher`] - HTTP fetch client with failure classification
//! - [`exporter`] - Scheduling, rate limiting, retry policy, and accounting
//! - [`output`] - JSON artifact writers (per-record, JSONL, combined, summary)
//! - [`shutdown`] - Cooperative cancellation shared across modules
//! - [`metrics`] - Optional Prometheus instrumentation

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Export orchestration: scheduler, retry policy, rate limiting, accounting
pub mod exporter;

/// HTTP record fetching and failure classification
pub mod fetcher;

/// Identifier input sources
pub mod input;

/// Prometheus metrics instrumentation
pub mod metrics;

/// JSON artifact writers
pub mod output;

/// Cooperative cancellation shared across modules
pub mod shutdown;

// Re-export the types most callers start from.
pub use exporter::{ExportConfig, RunReport, Scheduler};

/// Classification of why an attempt, or an identifier's whole run, failed.
///
/// The first three classes are retryable within the retry window; the rest are
/// terminal the moment they occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// HTTP 429 or an equivalent throttling signal from the server.
    RateLimited,
    /// HTTP 5xx or a transient transport fault (connection reset, DNS).
    ServerError,
    /// The request exceeded the configured per-request timeout.
    Timeout,
    /// HTTP 4xx other than 429, or an unusable response body; retrying cannot help.
    ClientError,
    /// The run was stopped before this identifier finished.
    Cancelled,
    /// A broken internal contract; aborts the whole run.
    Internal,
}

impl FailureKind {
    /// Whether the retry policy may schedule another attempt for this class.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError | Self::Timeout)
    }

    /// Stable lowercase label used in logs, metrics, and artifacts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::ClientError => "client_error",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
