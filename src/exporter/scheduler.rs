//! Worker pool and scheduling core.
//!
//! A fixed set of long-lived workers pulls jobs from one shared ready queue
//! ordered by next-eligible-time, then original enqueue order. Each attempt
//! waits on the shared [`RateLimiter`], performs one fetch, and either
//! finalizes the job or re-enqueues it with the delay chosen by the
//! [`RetryPolicy`]. A job waiting out a retry delay sits in the queue without
//! occupying a worker slot. The run ends only once every job is terminal, or
//! a stop signal cancels whatever has not finished.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, PoisonError};

use rand::Rng;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn, Instrument};

use crate::exporter::collector::{
    CollectorError, FailureRecord, Outcome, ResultCollector, RunReport,
};
use crate::exporter::events::{EventSender, ExportEvent};
use crate::exporter::job::{Job, JobState};
use crate::exporter::rate_limit::RateLimiter;
use crate::exporter::retry::{RetryDecision, RetryPolicy};
use crate::exporter::ExportConfig;
use crate::fetcher::RecordFetcher;
use crate::metrics;
use crate::shutdown::{SharedStop, StopSignal};
use crate::FailureKind;

/// Source of jitter samples in [-1.0, 1.0]; injectable for deterministic
/// tests.
pub type JitterSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A scheduler-internal contract was broken; the run is not trustworthy.
    #[error("internal contract violation: {0}")]
    Contract(#[from] CollectorError),

    /// A worker task panicked or the pool state was left inconsistent.
    #[error("worker failure: {0}")]
    Worker(String),
}

/// Bounded-concurrency, rate-limited batch fetch orchestrator.
pub struct Scheduler {
    config: ExportConfig,
    fetcher: Arc<dyn RecordFetcher>,
    stop: SharedStop,
    events: Option<EventSender>,
    jitter: JitterSource,
}

impl Scheduler {
    /// Build a scheduler over `fetcher` after validating `config`.
    pub fn new(config: ExportConfig, fetcher: Arc<dyn RecordFetcher>) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        Ok(Self {
            config,
            fetcher,
            stop: StopSignal::shared(),
            events: None,
            jitter: Arc::new(|| rand::rng().random_range(-1.0..=1.0)),
        })
    }

    /// Attach an external stop signal (e.g. the Ctrl+C handler's).
    pub fn with_stop(mut self, stop: SharedStop) -> Self {
        self.stop = stop;
        self
    }

    /// Publish [`ExportEvent`]s on `sender` as outcomes land.
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Replace the jitter source; tests pin it to a constant.
    pub fn with_jitter_source(mut self, source: JitterSource) -> Self {
        self.jitter = source;
        self
    }

    /// Fetch every identifier and return the complete accounting.
    ///
    /// Always returns one outcome per identifier: succeeded, failed, or
    /// cancelled. Only configuration problems and broken internal contracts
    /// surface as errors.
    pub async fn run(self, mut ids: Vec<String>) -> Result<RunReport, SchedulerError> {
        if let Some(limit) = self.config.limit {
            if ids.len() > limit {
                info!(limit, total = ids.len(), "limiting run to first identifiers");
                ids.truncate(limit);
            }
        }
        let total = ids.len();
        if total == 0 {
            return Ok(RunReport::default());
        }

        let workers = self.config.concurrency.min(total);
        info!(total, workers, rate = self.config.rate_limit, "starting export run");

        let shared = Arc::new(Shared {
            queue: Mutex::new(ReadyQueue::seed(&ids)),
            wake: Notify::new(),
            collector: Mutex::new(ResultCollector::new(&ids)),
            progress: Mutex::new(crate::exporter::progress::ProgressState::new(total as u64)),
            fetcher: Arc::clone(&self.fetcher),
            limiter: RateLimiter::new(self.config.rate_limit),
            policy: RetryPolicy::from_config(&self.config),
            stop: Arc::clone(&self.stop),
            events: self.events.clone(),
            jitter: Arc::clone(&self.jitter),
        });

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let shared = Arc::clone(&shared);
            pool.spawn(worker_loop(shared, worker));
        }

        let mut first_error: Option<SchedulerError> = None;
        while let Some(joined) = pool.join_next().await {
            let failed = match joined {
                Ok(Ok(())) => None,
                Ok(Err(error)) => Some(error),
                Err(join_error) => Some(SchedulerError::Worker(join_error.to_string())),
            };
            if let Some(error) = failed {
                // One broken worker invalidates the accounting; stop the rest.
                self.stop.trigger();
                first_error.get_or_insert(error);
            }
        }
        drop(self.events);

        if let Some(error) = first_error {
            return Err(error);
        }

        let shared = Arc::into_inner(shared).ok_or_else(|| {
            SchedulerError::Worker("scheduler state still shared after pool shutdown".to_string())
        })?;
        let report = shared
            .collector
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .finalize()?;
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "export run finished"
        );
        Ok(report)
    }
}

/// One queue entry; ordered by eligibility time, ties broken by original
/// enqueue order.
struct QueuedJob {
    seq: usize,
    job: Job,
}

impl QueuedJob {
    fn key(&self) -> (Instant, usize) {
        (self.job.next_eligible, self.seq)
    }
}

impl PartialEq for QueuedJob {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedJob {}

impl PartialOrd for QueuedJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest-eligible job wins.
        other.key().cmp(&self.key())
    }
}

/// The shared ready queue plus the count of jobs not yet terminal.
struct ReadyQueue {
    heap: BinaryHeap<QueuedJob>,
    remaining: usize,
}

impl ReadyQueue {
    fn seed(ids: &[String]) -> Self {
        let heap = ids
            .iter()
            .enumerate()
            .map(|(seq, id)| QueuedJob {
                seq,
                job: Job::new(id.clone()),
            })
            .collect();
        Self {
            heap,
            remaining: ids.len(),
        }
    }
}

/// State shared by every worker of one run.
struct Shared {
    queue: Mutex<ReadyQueue>,
    wake: Notify,
    collector: Mutex<ResultCollector>,
    progress: Mutex<crate::exporter::progress::ProgressState>,
    fetcher: Arc<dyn RecordFetcher>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    stop: SharedStop,
    events: Option<EventSender>,
    jitter: JitterSource,
}

/// What a worker should do next, decided under the queue lock.
enum Action {
    Run(QueuedJob),
    Sleep(Instant),
    Idle,
    Done,
}

fn lock_queue(shared: &Shared) -> std::sync::MutexGuard<'_, ReadyQueue> {
    shared.queue.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_action(shared: &Shared) -> Action {
    let mut queue = lock_queue(shared);
    if queue.remaining == 0 {
        return Action::Done;
    }
    let now = Instant::now();
    match queue.heap.peek().map(|entry| entry.job.next_eligible) {
        Some(at) if at <= now => match queue.heap.pop() {
            Some(entry) => Action::Run(entry),
            None => Action::Idle,
        },
        Some(at) => Action::Sleep(at),
        // Everything outstanding is in flight on other workers.
        None => Action::Idle,
    }
}

async fn worker_loop(shared: Arc<Shared>, worker: usize) -> Result<(), SchedulerError> {
    debug!(worker, "worker started");
    loop {
        if shared.stop.is_triggered() {
            drain_cancelled(&shared)?;
            shared.wake.notify_one();
            debug!(worker, "worker stopped by cancellation");
            return Ok(());
        }
        match next_action(&shared) {
            Action::Done => {
                // Chain the wakeup so every idle worker observes completion.
                shared.wake.notify_one();
                debug!(worker, "worker finished");
                return Ok(());
            }
            Action::Run(entry) => process_attempt(&shared, entry).await?,
            Action::Sleep(at) => {
                tokio::select! {
                    _ = sleep_until(at) => {}
                    _ = shared.wake.notified() => {}
                    _ = shared.stop.cancelled() => {}
                }
            }
            Action::Idle => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shared.stop.cancelled() => {}
                }
            }
        }
    }
}

/// Run one fetch attempt for a dequeued job and route the result.
async fn process_attempt(shared: &Shared, mut entry: QueuedJob) -> Result<(), SchedulerError> {
    entry.job.state = JobState::InFlight;
    if entry.job.first_attempt.is_none() {
        entry.job.first_attempt = Some(Instant::now());
    }

    tokio::select! {
        biased;
        _ = shared.stop.cancelled() => return finalize_cancelled(shared, entry.job),
        _ = shared.limiter.acquire() => {}
    }

    metrics::record_fetch_attempt();
    let attempt_number = entry.job.attempts + 1;
    let span = tracing::info_span!("fetch", id = %entry.job.id, attempt = attempt_number);
    let fetched = tokio::select! {
        biased;
        _ = shared.stop.cancelled() => None,
        result = shared.fetcher.fetch_record(&entry.job.id).instrument(span) => Some(result),
    };

    let Some(result) = fetched else {
        return finalize_cancelled(shared, entry.job);
    };

    let now = Instant::now();
    let retries_so_far = entry.job.attempts;
    entry.job.attempts += 1;
    let elapsed = entry.job.elapsed_since_first_attempt(now);

    match result {
        Ok(payload) => {
            entry.job.state = JobState::Succeeded;
            let outcome = Outcome::Success {
                payload: payload.clone(),
                attempts: entry.job.attempts,
                elapsed,
            };
            metrics::record_terminal_outcome("succeeded");
            record_terminal(
                shared,
                &entry.job.id,
                outcome,
                ExportEvent::Fetched {
                    id: entry.job.id.clone(),
                    payload,
                    attempts: entry.job.attempts,
                },
            )?;
            mark_job_done(shared);
            Ok(())
        }
        Err(failure) => {
            metrics::record_fetch_failure(failure.kind);
            let decision =
                shared
                    .policy
                    .decide(retries_so_far, elapsed, &failure, (shared.jitter)());
            match decision {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        id = %entry.job.id,
                        attempt = entry.job.attempts,
                        kind = %failure.kind,
                        delay_secs = delay.as_secs_f64(),
                        "attempt failed; retry scheduled"
                    );
                    metrics::record_retry_scheduled(failure.kind, delay);
                    send_event(
                        shared,
                        ExportEvent::RetryScheduled {
                            id: entry.job.id.clone(),
                            attempt: entry.job.attempts,
                            kind: failure.kind,
                            delay,
                        },
                    );
                    entry.job.state = JobState::AwaitingRetry;
                    requeue(shared, entry, delay);
                    Ok(())
                }
                RetryDecision::GiveUp => {
                    entry.job.state = JobState::Failed;
                    let record = FailureRecord {
                        id: entry.job.id.clone(),
                        kind: failure.kind,
                        status: failure.status,
                        message: failure.message.clone(),
                        attempts: entry.job.attempts,
                        elapsed,
                    };
                    metrics::record_terminal_outcome("failed");
                    record_terminal(
                        shared,
                        &entry.job.id,
                        Outcome::Failed(record.clone()),
                        ExportEvent::Failed { record },
                    )?;
                    mark_job_done(shared);
                    Ok(())
                }
            }
        }
    }
}

/// Put a retrying job back in the queue, eligible after `delay`.
fn requeue(shared: &Shared, mut entry: QueuedJob, delay: std::time::Duration) {
    entry.job.state = JobState::Pending;
    entry.job.next_eligible = Instant::now() + delay;
    lock_queue(shared).heap.push(entry);
    shared.wake.notify_one();
}

/// Finalize one job the stop signal caught before it finished.
fn finalize_cancelled(shared: &Shared, mut job: Job) -> Result<(), SchedulerError> {
    job.state = JobState::Cancelled;
    let record = FailureRecord {
        id: job.id.clone(),
        kind: FailureKind::Cancelled,
        status: None,
        message: "run cancelled before this identifier finished".to_string(),
        attempts: job.attempts,
        elapsed: job.elapsed_since_first_attempt(Instant::now()),
    };
    metrics::record_terminal_outcome("cancelled");
    record_terminal(
        shared,
        &job.id,
        Outcome::Failed(record.clone()),
        ExportEvent::Failed { record },
    )?;
    mark_job_done(shared);
    Ok(())
}

/// Cancel everything still sitting in the ready queue.
fn drain_cancelled(shared: &Shared) -> Result<(), SchedulerError> {
    loop {
        let entry = lock_queue(shared).heap.pop();
        match entry {
            Some(entry) => finalize_cancelled(shared, entry.job)?,
            None => return Ok(()),
        }
    }
}

/// Hand one outcome to the collector and surface the transition.
fn record_terminal(
    shared: &Shared,
    id: &str,
    outcome: Outcome,
    event: ExportEvent,
) -> Result<(), SchedulerError> {
    shared
        .collector
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .record(id, outcome)?;

    let mut progress = shared
        .progress
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    progress.record_terminal();
    debug!(
        id,
        completed = progress.completed,
        total = progress.total,
        "identifier reached a terminal state"
    );
    if progress.should_emit() {
        info!("{}", progress.format_progress());
        progress.mark_emitted();
    }
    drop(progress);

    send_event(shared, event);
    Ok(())
}

fn send_event(shared: &Shared, event: ExportEvent) {
    if let Some(events) = &shared.events {
        // The consumer hanging up is not the workers' problem.
        let _ = events.send(event);
    }
}

/// Mark one job terminal in the queue accounting and wake idle workers.
fn mark_job_done(shared: &Shared) {
    let remaining = {
        let mut queue = lock_queue(shared);
        queue.remaining = queue.remaining.saturating_sub(1);
        queue.remaining
    };
    if remaining == 0 {
        shared.wake.notify_waiters();
    }
    shared.wake.notify_one();
}
