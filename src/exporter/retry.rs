//! Pure retry policy: exponential backoff with jitter inside a bounded window.

use std::time::Duration;

use crate::exporter::config::ExportConfig;
use crate::fetcher::FetchFailure;
use crate::FailureKind;

/// Exponent ceiling; beyond this the doubling is already past any sane cap.
const MAX_BACKOFF_SHIFT: u32 = 32;

/// What the scheduler should do with a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue the job, eligible again after this delay.
    RetryAfter(Duration),
    /// Finalize the job as failed.
    GiveUp,
}

/// Decides whether and when a failed fetch is retried.
///
/// The decision is a pure function of the attempt count, the elapsed time
/// since the job's first attempt, and the failure itself; the jitter sample
/// is passed in so callers control the randomness.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    retry_window: Duration,
    jitter: f64,
}

impl RetryPolicy {
    /// Build a policy with the given backoff shape and an unjittered default
    /// of ±20%.
    pub fn new(base_delay: Duration, max_delay: Duration, retry_window: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            retry_window,
            jitter: super::config::DEFAULT_JITTER,
        }
    }

    /// Replace the jitter fraction (clamped to 0.0..=1.0).
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Derive the policy from an export configuration.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.base_delay, config.max_delay, config.retry_window)
            .with_jitter(config.jitter)
    }

    /// The retry window this policy enforces.
    pub fn retry_window(&self) -> Duration {
        self.retry_window
    }

    /// Decide the fate of a job whose latest attempt failed.
    ///
    /// `attempt` is the number of retries already performed (0 on the first
    /// failure), `elapsed` the time since the job's first attempt, and
    /// `jitter_unit` a sample in [-1.0, 1.0] scaling the jitter fraction.
    /// Identical inputs always produce identical decisions.
    pub fn decide(
        &self,
        attempt: u32,
        elapsed: Duration,
        failure: &FetchFailure,
        jitter_unit: f64,
    ) -> RetryDecision {
        if !failure.kind.is_retryable() {
            return RetryDecision::GiveUp;
        }
        if elapsed > self.retry_window {
            return RetryDecision::GiveUp;
        }

        // A server that said when to come back knows better than the
        // exponential schedule; still respect the delay ceiling.
        if failure.kind == FailureKind::RateLimited {
            if let Some(hint) = failure.retry_after {
                return RetryDecision::RetryAfter(hint.min(self.max_delay));
            }
        }

        let factor = 1u64 << attempt.min(MAX_BACKOFF_SHIFT);
        let base_ms = self.base_delay.as_millis() as u64;
        let capped_ms = base_ms
            .saturating_mul(factor)
            .min(self.max_delay.as_millis() as u64);

        let scale = 1.0 + self.jitter * jitter_unit.clamp(-1.0, 1.0);
        let jittered_ms = (capped_ms as f64 * scale).max(0.0);
        RetryDecision::RetryAfter(Duration::from_millis(jittered_ms as u64))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}
