//! Event stream published by the scheduler for the output and logging
//! collaborators.
//!
//! Workers send on an unbounded channel and never block on the consumer; the
//! channel closes when the run finishes, ending the consumer loop. Terminal
//! events arrive as outcomes land, so large runs can write artifacts
//! incrementally instead of holding every payload until the end.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::exporter::collector::FailureRecord;
use crate::FailureKind;

/// Sending half handed to the scheduler.
pub type EventSender = mpsc::UnboundedSender<ExportEvent>;

/// Receiving half consumed by the CLI layer.
pub type EventReceiver = mpsc::UnboundedReceiver<ExportEvent>;

/// Create the event channel for one run.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// One observable scheduler transition.
#[derive(Debug, Clone)]
pub enum ExportEvent {
    /// An identifier reached `Succeeded`; the payload is ready to persist.
    Fetched {
        /// The identifier that succeeded.
        id: String,
        /// Parsed response body.
        payload: serde_json::Value,
        /// Total fetch attempts made.
        attempts: u32,
    },
    /// An identifier reached `Failed` or `Cancelled`.
    Failed {
        /// Everything known about the failure.
        record: FailureRecord,
    },
    /// A retry was queued for a future eligible time.
    RetryScheduled {
        /// The identifier being retried.
        id: String,
        /// Fetch attempts made so far.
        attempt: u32,
        /// Classification of the failure that triggered the retry.
        kind: FailureKind,
        /// Delay before the job becomes eligible again.
        delay: Duration,
    },
}
