//! Export orchestration: scheduling, rate limiting, retries, and accounting.
//!
//! ## Overview
//!
//! The [`Scheduler`] drives a bounded worker pool over a shared ready queue.
//! Every attempt passes the shared [`RateLimiter`] before touching the
//! network; failures are classified by the fetch client and fed to the pure
//! [`RetryPolicy`], which either schedules a delayed retry or finalizes the
//! job. The [`ResultCollector`] guarantees exactly one [`Outcome`] per
//! identifier, and [`ExportEvent`]s stream terminal results to the output
//! layer as they land.

pub mod collector;
pub mod config;
pub mod events;
pub mod job;
pub mod progress;
pub mod rate_limit;
pub mod retry;
pub mod scheduler;

pub use collector::{
    CollectorError, FailureRecord, Outcome, ResultCollector, RunReport, SuccessRecord,
};
pub use config::ExportConfig;
pub use events::{channel, EventReceiver, EventSender, ExportEvent};
pub use job::{Job, JobState};
pub use progress::ProgressState;
pub use rate_limit::RateLimiter;
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{JitterSource, Scheduler, SchedulerError};
