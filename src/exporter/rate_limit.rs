//! Shared admission gate keeping outbound requests under a requests-per-second
//! ceiling.
//!
//! Admissions are evenly spaced: one slot every `1/rate` seconds, with no burst
//! capacity, so no rolling one-second window ever sees more than `rate`
//! acquisitions. The slot reservation sits behind a tokio [`Mutex`], whose
//! FIFO wakeup order gives waiting workers bounded, arrival-ordered service.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Token gate shared by all workers of a run.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum spacing between two admissions.
    interval: Duration,
    /// Start of the next free admission slot.
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Build a limiter admitting `rate` requests per second.
    ///
    /// `rate` must be positive and finite; [`ExportConfig::validate`] enforces
    /// this before a limiter is constructed.
    ///
    /// [`ExportConfig::validate`]: crate::exporter::ExportConfig::validate
    pub fn new(rate: f64) -> Self {
        debug_assert!(rate.is_finite() && rate > 0.0);
        Self {
            interval: Duration::from_secs_f64(1.0 / rate),
            next_slot: Mutex::new(None),
        }
    }

    /// Block until one admission token is available, then consume it.
    ///
    /// Reserving the slot and advancing the refill state happens under the
    /// lock; the wait for the reserved slot happens outside it, so a slow
    /// admission never serializes the reservations behind it.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        sleep_until(slot).await;
    }

    /// The configured spacing between admissions.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
