//! Progress reporting cadence for long runs.
//!
//! Emitting a log line for every terminal transition would swamp the output on
//! large identifier lists, so [`ProgressState`] gates emission on a completion
//! count step, a percentage step, or an elapsed interval, and formats the
//! throughput and remaining-time estimate that surface in the scheduler's
//! progress lines.

use std::time::{Duration, Instant};

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_COUNT_STEP: u64 = 100;
const DEFAULT_PERCENTAGE_STEP: f64 = 10.0;

/// Tracks completions against the run total and decides when to report.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Identifiers that reached a terminal state so far.
    pub completed: u64,
    /// Total identifiers in the run.
    pub total: u64,
    start: Instant,
    last_update: Instant,
    last_reported_count: u64,
    last_reported_percentage: f64,
    count_step: u64,
    min_percentage_step: f64,
    update_interval: Duration,
}

impl ProgressState {
    /// Track a run of `total` identifiers with the default cadence: every 100
    /// completions, every 10% of the total, or once a minute, whichever comes
    /// first.
    pub fn new(total: u64) -> Self {
        let now = Instant::now();
        Self {
            completed: 0,
            total,
            start: now,
            last_update: now,
            last_reported_count: 0,
            last_reported_percentage: 0.0,
            count_step: DEFAULT_COUNT_STEP,
            min_percentage_step: DEFAULT_PERCENTAGE_STEP,
            update_interval: DEFAULT_UPDATE_INTERVAL,
        }
    }

    /// Replace the completion-count step.
    pub fn with_count_step(mut self, step: u64) -> Self {
        self.count_step = step.max(1);
        self
    }

    /// Count one terminal transition.
    pub fn record_terminal(&mut self) {
        self.completed = self.completed.saturating_add(1);
    }

    /// Completion percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.completed as f64 / self.total as f64) * 100.0
    }

    /// Terminal transitions per second since the run started.
    pub fn rate(&self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.completed as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Estimated time until the remaining identifiers complete.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        let rate = self.rate();
        let remaining = self.total.saturating_sub(self.completed);
        if rate > 0.0 && remaining > 0 {
            Some(Duration::from_secs_f64(remaining as f64 / rate))
        } else {
            None
        }
    }

    /// Whether a progress line should be emitted now.
    pub fn should_emit(&self) -> bool {
        if self.completed == 0 {
            return false;
        }
        if self.completed == self.total {
            return self.last_reported_count < self.completed;
        }
        if self.completed - self.last_reported_count >= self.count_step {
            return true;
        }
        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }
        self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress line to reset the cadence gates.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_count = self.completed;
        self.last_reported_percentage = self.percentage();
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "processed {}/{} identifiers ({:.1}%)",
            self.completed,
            self.total,
            self.percentage()
        )];

        let rate = self.rate();
        if rate > 0.0 {
            parts.push(format!("at {rate:.1}/sec"));
        }
        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Compact duration rendering for progress lines ("42s", "3m", "1.5h").
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
