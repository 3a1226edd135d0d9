//! Cooperative cancellation for in-progress export runs.
//!
//! A [`StopSignal`] is handed to the scheduler and to the Ctrl+C handler; the
//! first `trigger()` wins and every waiter observes it. Triggering is
//! irreversible for the lifetime of the signal.

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handle to a stop signal.
pub type SharedStop = Arc<StopSignal>;

/// One-shot cancellation flag with async waiters.
#[derive(Debug, Default)]
pub struct StopSignal {
    triggered: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    /// Create a fresh, untriggered signal.
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Create a fresh signal wrapped in [`Arc`].
    pub fn shared() -> SharedStop {
        Arc::new(Self::new())
    }

    /// Request cancellation. Waiters are notified exactly once.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested; immediately if it already was.
    pub async fn cancelled(&self) {
        if self.is_triggered() {
            return;
        }
        let mut notified = pin!(self.notify.notified());
        // Register interest before re-checking the flag so a trigger landing
        // between the check and the await cannot be missed.
        notified.as_mut().enable();
        if self.is_triggered() {
            return;
        }
        notified.await;
    }
}
