//! Observability for the resilient client.
//!
//! The client emits one structured [`CallEvent`] per state transition of
//! every logical call. Sinks implement [`CallObserver`]; the client
//! depends on the trait only, so logging and metrics backends are
//! swappable. Events carry statuses, timings, and classifications, but
//! never credentials, headers, or bodies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Phase of one logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    /// Waiting for a rate-limit slot
    Throttled,
    /// A physical attempt is executing
    InFlight,
    /// Terminal: the call returned a payload
    Succeeded,
    /// A retry was scheduled after a retriable failure
    RetryScheduled,
    /// Terminal: the call failed
    Failed,
}

impl CallState {
    /// Short name used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Throttled => "throttled",
            Self::InFlight => "in_flight",
            Self::Succeeded => "succeeded",
            Self::RetryScheduled => "retry_scheduled",
            Self::Failed => "failed",
        }
    }
}

/// One state transition of one logical call
#[derive(Debug, Clone)]
pub struct CallEvent {
    /// Correlates every event of one logical call
    pub call_id: Uuid,
    /// The state entered
    pub state: CallState,
    /// Physical attempt number, 1-based
    pub attempt: u32,
    /// Wait attached to this transition: admission wait for `Throttled`,
    /// scheduled delay for `RetryScheduled`
    pub waited: Option<Duration>,
    /// HTTP status, where one exists
    pub status: Option<u16>,
    /// Terminal error family for `Failed`
    pub error_code: Option<&'static str>,
}

/// Sink for call state transitions
pub trait CallObserver: Send + Sync {
    /// Receive one transition event
    fn on_transition(&self, event: &CallEvent);
}

/// Observer that discards every event
#[derive(Debug, Default)]
pub struct NullObserver;

impl CallObserver for NullObserver {
    fn on_transition(&self, _event: &CallEvent) {}
}

/// Default observer logging transitions through `tracing`
#[derive(Debug, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_transition(&self, event: &CallEvent) {
        let waited_ms = event.waited.map(|w| w.as_millis() as u64);
        match event.state {
            CallState::Throttled | CallState::InFlight | CallState::Succeeded => {
                debug!(
                    call_id = %event.call_id,
                    state = event.state.as_str(),
                    attempt = event.attempt,
                    waited_ms,
                    status = event.status,
                    "call transition"
                );
            }
            CallState::RetryScheduled => {
                warn!(
                    call_id = %event.call_id,
                    attempt = event.attempt,
                    delay_ms = waited_ms,
                    status = event.status,
                    "retrying after transient failure"
                );
            }
            CallState::Failed => {
                warn!(
                    call_id = %event.call_id,
                    attempt = event.attempt,
                    status = event.status,
                    error_code = event.error_code,
                    "call failed"
                );
            }
        }
    }
}

/// Counters aggregated across all calls of a client
#[derive(Debug, Default)]
pub struct Metrics {
    attempts_total: AtomicU64,
    calls_succeeded: AtomicU64,
    calls_failed: AtomicU64,
    retries_scheduled: AtomicU64,
    throttle_events: AtomicU64,
    throttle_wait_us: AtomicU64,
}

impl Metrics {
    /// Create a fresh set of counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Total physical attempts started
    pub fn attempts_total(&self) -> u64 {
        self.attempts_total.load(Ordering::Relaxed)
    }

    /// Calls that returned a payload
    pub fn calls_succeeded(&self) -> u64 {
        self.calls_succeeded.load(Ordering::Relaxed)
    }

    /// Calls that ended in a terminal error
    pub fn calls_failed(&self) -> u64 {
        self.calls_failed.load(Ordering::Relaxed)
    }

    /// Retries scheduled after retriable failures
    pub fn retries_scheduled(&self) -> u64 {
        self.retries_scheduled.load(Ordering::Relaxed)
    }

    /// Admissions that had to wait for capacity
    pub fn throttle_events(&self) -> u64 {
        self.throttle_events.load(Ordering::Relaxed)
    }

    /// Total admission wait
    pub fn throttle_wait(&self) -> Duration {
        Duration::from_micros(self.throttle_wait_us.load(Ordering::Relaxed))
    }

    /// Point-in-time snapshot of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            attempts_total: self.attempts_total(),
            calls_succeeded: self.calls_succeeded(),
            calls_failed: self.calls_failed(),
            retries_scheduled: self.retries_scheduled(),
            throttle_events: self.throttle_events(),
            throttle_wait: self.throttle_wait(),
        }
    }
}

/// A snapshot of [`Metrics`] at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total physical attempts started
    pub attempts_total: u64,
    /// Calls that returned a payload
    pub calls_succeeded: u64,
    /// Calls that ended in a terminal error
    pub calls_failed: u64,
    /// Retries scheduled
    pub retries_scheduled: u64,
    /// Admissions that waited
    pub throttle_events: u64,
    /// Total admission wait
    pub throttle_wait: Duration,
}

/// Observer aggregating events into [`Metrics`]
#[derive(Debug, Default)]
pub struct MetricsObserver {
    metrics: Arc<Metrics>,
}

impl MetricsObserver {
    /// Create an observer with fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle to the aggregated counters
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }
}

impl CallObserver for MetricsObserver {
    fn on_transition(&self, event: &CallEvent) {
        match event.state {
            CallState::Throttled => {
                if let Some(waited) = event.waited.filter(|w| !w.is_zero()) {
                    self.metrics.throttle_events.fetch_add(1, Ordering::Relaxed);
                    self.metrics
                        .throttle_wait_us
                        .fetch_add(waited.as_micros() as u64, Ordering::Relaxed);
                }
            }
            CallState::InFlight => {
                self.metrics.attempts_total.fetch_add(1, Ordering::Relaxed);
            }
            CallState::Succeeded => {
                self.metrics.calls_succeeded.fetch_add(1, Ordering::Relaxed);
            }
            CallState::RetryScheduled => {
                self.metrics.retries_scheduled.fetch_add(1, Ordering::Relaxed);
            }
            CallState::Failed => {
                self.metrics.calls_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Headers whose values must never reach logs
pub const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
];

/// Redact a single header value when its name is sensitive
pub fn redact_header(name: &str, value: &str) -> String {
    if SENSITIVE_HEADERS.contains(&name.to_lowercase().as_str()) {
        "[REDACTED]".to_string()
    } else {
        value.to_string()
    }
}

/// Render a header map with sensitive values redacted
pub fn redacted_headers(headers: &http::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("[non-ascii]");
            (name.to_string(), redact_header(name.as_str(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(state: CallState, waited: Option<Duration>) -> CallEvent {
        CallEvent {
            call_id: Uuid::new_v4(),
            state,
            attempt: 1,
            waited,
            status: None,
            error_code: None,
        }
    }

    #[test]
    fn test_metrics_observer_counts_transitions() {
        let observer = MetricsObserver::new();

        observer.on_transition(&event(CallState::Throttled, Some(Duration::from_millis(40))));
        observer.on_transition(&event(CallState::InFlight, None));
        observer.on_transition(&event(CallState::RetryScheduled, Some(Duration::from_millis(10))));
        observer.on_transition(&event(CallState::InFlight, None));
        observer.on_transition(&event(CallState::Succeeded, None));

        let snapshot = observer.metrics().snapshot();
        assert_eq!(snapshot.attempts_total, 2);
        assert_eq!(snapshot.retries_scheduled, 1);
        assert_eq!(snapshot.calls_succeeded, 1);
        assert_eq!(snapshot.calls_failed, 0);
        assert_eq!(snapshot.throttle_events, 1);
        assert_eq!(snapshot.throttle_wait, Duration::from_millis(40));
    }

    #[test]
    fn test_zero_wait_is_not_a_throttle_event() {
        let observer = MetricsObserver::new();
        observer.on_transition(&event(CallState::Throttled, Some(Duration::ZERO)));
        assert_eq!(observer.metrics().throttle_events(), 0);
    }

    #[test]
    fn test_redact_header() {
        assert_eq!(redact_header("Authorization", "Bearer token"), "[REDACTED]");
        assert_eq!(
            redact_header("Content-Type", "application/json"),
            "application/json"
        );
    }

    #[test]
    fn test_redacted_headers_masks_authorization() {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            http::HeaderValue::from_static("Bearer secret"),
        );
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/json"),
        );

        let rendered = redacted_headers(&headers);
        assert!(rendered.contains(&("authorization".to_string(), "[REDACTED]".to_string())));
        assert!(rendered.contains(&("accept".to_string(), "application/json".to_string())));
    }
}
