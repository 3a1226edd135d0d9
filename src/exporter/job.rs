//! Per-identifier job state tracked by the scheduler.

use tokio::time::Instant;

/// Lifecycle of one identifier within a run.
///
/// `Pending → InFlight → {Succeeded | AwaitingRetry → Pending | Failed}`,
/// with `Cancelled` as the terminal state for work cut short by a stop
/// signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    /// Waiting in the ready queue for a worker.
    #[default]
    Pending,
    /// A worker is currently fetching this identifier.
    InFlight,
    /// A retry has been scheduled for a future eligible time.
    AwaitingRetry,
    /// Terminal: the payload was fetched.
    Succeeded,
    /// Terminal: retries were exhausted or the failure was not retryable.
    Failed,
    /// Terminal: the run was stopped before this identifier finished.
    Cancelled,
}

impl JobState {
    /// Whether no further transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// One identifier's scheduling record.
///
/// Owned exclusively by the scheduler's queue; only the outcome leaves it.
#[derive(Debug, Clone)]
pub struct Job {
    /// The identifier this job fetches.
    pub id: String,
    /// Fetch attempts performed so far.
    pub attempts: u32,
    /// Current lifecycle state.
    pub state: JobState,
    /// When the first attempt was dequeued; unset until then.
    pub first_attempt: Option<Instant>,
    /// Earliest time this job may next be dequeued.
    pub next_eligible: Instant,
}

impl Job {
    /// Create a pending job, eligible immediately.
    pub fn new(id: String) -> Self {
        Self {
            id,
            attempts: 0,
            state: JobState::Pending,
            first_attempt: None,
            next_eligible: Instant::now(),
        }
    }

    /// Elapsed time since the first attempt, zero if none was made yet.
    pub fn elapsed_since_first_attempt(&self, now: Instant) -> std::time::Duration {
        self.first_attempt
            .map(|first| now.saturating_duration_since(first))
            .unwrap_or_default()
    }
}
