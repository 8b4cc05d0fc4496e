//! Token bucket rate limiter with continuous refill.
//!
//! One instance guards one upstream quota. Every caller that must share
//! that quota holds a clone of the same `Arc<RateLimiter>`; per-tenant
//! isolation means constructing independent instances, never subdividing
//! one instance's counters.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Fractional token bucket state
struct Bucket {
    available: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, max_requests: u32, period: Duration) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        let rate = max_requests as f64 / period.as_secs_f64();
        self.available = (self.available + elapsed * rate).min(max_requests as f64);
        self.last_refill = now;
    }
}

/// Admits callers at a smoothed average rate of `max_requests / period`.
///
/// `acquire` never fails; it only delays. Capacity accrues continuously,
/// so the limiter never allows a full burst at a window boundary the way
/// a fixed-window counter would.
pub struct RateLimiter {
    /// FIFO admission queue; waiters are serviced in arrival order
    admission: tokio::sync::Mutex<()>,
    /// Bucket counters, locked only for the brief read-modify-write
    state: Mutex<Bucket>,
    max_requests: u32,
    period: Duration,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `period`.
    ///
    /// The bucket starts empty: capacity accrues from construction time,
    /// so a freshly built limiter spreads even its first burst across the
    /// period.
    pub fn new(max_requests: u32, period: Duration) -> Self {
        let max_requests = max_requests.max(1);
        let period = if period.is_zero() {
            Duration::from_millis(1)
        } else {
            period
        };

        Self {
            admission: tokio::sync::Mutex::new(()),
            state: Mutex::new(Bucket {
                available: 0.0,
                last_refill: Instant::now(),
            }),
            max_requests,
            period,
        }
    }

    /// Consume one unit of capacity, suspending until it is available.
    ///
    /// Returns the time spent waiting. Callers queue in arrival order
    /// (tokio's mutex wakes waiters FIFO); the bucket lock itself is held
    /// only for the counter update, never across the sleep. Dropping the
    /// future while suspended consumes nothing.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        let _turn = self.admission.lock().await;

        loop {
            let wait = {
                let mut bucket = self.state.lock();
                bucket.refill(self.max_requests, self.period);
                if bucket.available >= 1.0 {
                    bucket.available -= 1.0;
                    return started.elapsed();
                }
                self.time_until_one(bucket.available)
            };

            trace!(wait_ms = wait.as_millis() as u64, "waiting for admission");
            tokio::time::sleep(wait).await;
            // Timers may fire marginally early; loop to re-check the bucket.
        }
    }

    fn time_until_one(&self, available: f64) -> Duration {
        let deficit = (1.0 - available).max(0.0);
        let seconds = deficit * self.period.as_secs_f64() / self.max_requests as f64;
        Duration::from_secs_f64(seconds)
    }

    /// Current capacity, after refilling to now. Probe for tests and
    /// health reporting; racing callers may consume it immediately.
    pub fn available(&self) -> f64 {
        let mut bucket = self.state.lock();
        bucket.refill(self.max_requests, self.period);
        bucket.available
    }

    /// Configured burst capacity
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Configured quota window
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("max_requests", &self.max_requests)
            .field("period", &self.period)
            .field("available", &self.available())
            .finish()
    }
}
