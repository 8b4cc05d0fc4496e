//! Backoff schedule for retriable failures.

use crate::config::RetryConfig;
use std::time::Duration;

/// Computes the delay inserted before a retry attempt.
///
/// The schedule is a pure function of the attempt number and an optional
/// server-supplied wait hint; it performs no sleeping itself.
#[derive(Debug, Clone)]
pub struct BackoffScheduler {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    with_jitter: bool,
}

impl BackoffScheduler {
    /// Build a scheduler from retry configuration
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            multiplier: config.multiplier,
            with_jitter: config.with_jitter,
        }
    }

    /// Delay before the next physical attempt.
    ///
    /// `attempt` is 1-based: `delay(1, None)` is the pause before the
    /// second physical attempt. A `server_hint` wins unconditionally over
    /// the exponential schedule. Without jitter the result is exactly
    /// `base_delay * multiplier^(attempt-1)`, clamped to
    /// `[base_delay, max_delay]`.
    pub fn delay(&self, attempt: u32, server_hint: Option<Duration>) -> Duration {
        if let Some(hint) = server_hint {
            return hint;
        }

        let base = self.base_delay.as_millis() as f64
            * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let clamped = base.clamp(
            self.base_delay.as_millis() as f64,
            self.max_delay.as_millis() as f64,
        );

        let millis = if self.with_jitter {
            // Jittered delays land between 50% and 150% of the computed value.
            clamped * (0.5 + rand_jitter())
        } else {
            clamped
        };

        Duration::from_millis(millis as u64)
    }
}

/// Simple pseudo-random jitter (0.0 to 1.0)
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    ((seed.wrapping_mul(1103515245).wrapping_add(12345)) % 100) as f64 / 100.0
}
