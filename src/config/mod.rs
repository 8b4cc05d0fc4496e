//! Configuration for the resilient client core.
//!
//! Supports configuration via:
//! - Explicit values
//! - Builder pattern with build-time validation
//!
//! Every knob has a documented default except `base_url`, which is
//! always required.

use crate::errors::{ClientResult, ConfigurationError};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

/// Default User-Agent header
pub const DEFAULT_USER_AGENT: &str = "integrations-core/0.1.0";

/// Default per-attempt request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default quota: 50 requests per minute
pub const DEFAULT_MAX_REQUESTS: u32 = 50;

/// Default quota window
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

/// Status codes retried by default: rate-limit rejection and server-side 5xx
static DEFAULT_RETRIABLE_STATUSES: Lazy<HashSet<u16>> =
    Lazy::new(|| [429, 500, 502, 503, 504].into_iter().collect());

/// Status codes that always fail fast: client-side request defects
static DEFAULT_NON_RETRIABLE_STATUSES: Lazy<HashSet<u16>> =
    Lazy::new(|| [400, 401, 403, 404, 422].into_iter().collect());

/// Request quota shared by all callers of one client
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// Maximum requests admitted per `period`
    pub max_requests: u32,
    /// Length of the quota window
    pub period: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            period: DEFAULT_PERIOD,
        }
    }
}

impl QuotaConfig {
    /// Create a quota of `max_requests` per `period`
    pub fn new(max_requests: u32, period: Duration) -> Self {
        Self {
            max_requests,
            period,
        }
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_requests == 0 {
            return Err(ConfigurationError::InvalidValue {
                message: "max_requests must be greater than zero".to_string(),
            });
        }
        if self.period.is_zero() {
            return Err(ConfigurationError::InvalidValue {
                message: "period must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Retry behavior for retriable failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total physical attempts per call, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on any computed delay
    pub max_delay: Duration,
    /// Exponential growth factor between attempts
    pub multiplier: f64,
    /// Randomize delays between 50% and 150% of the computed value.
    /// Off by default; the schedule is deterministic unless this is set.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set total attempts
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the delay cap
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the growth factor
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::InvalidValue {
                message: "max_attempts must be at least one".to_string(),
            });
        }
        if self.base_delay > self.max_delay {
            return Err(ConfigurationError::InvalidValue {
                message: "base_delay must not exceed max_delay".to_string(),
            });
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigurationError::InvalidValue {
                message: "multiplier must be a finite value of at least 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Status-code sets driving retry classification
///
/// A status present in both sets is treated as non-retriable; a status in
/// neither set fails fast.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Statuses classified as retriable
    pub retriable_statuses: HashSet<u16>,
    /// Statuses classified as non-retriable, overriding `retriable_statuses`
    pub non_retriable_statuses: HashSet<u16>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            retriable_statuses: DEFAULT_RETRIABLE_STATUSES.clone(),
            non_retriable_statuses: DEFAULT_NON_RETRIABLE_STATUSES.clone(),
        }
    }
}

impl ClassifierConfig {
    /// Create a new classifier configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retriable status set
    pub fn retriable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retriable_statuses = statuses.into_iter().collect();
        self
    }

    /// Replace the non-retriable status set
    pub fn non_retriable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.non_retriable_statuses = statuses.into_iter().collect();
        self
    }
}

/// Configuration for a resilient client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the remote API
    pub base_url: Url,
    /// User-Agent header sent on every request
    pub user_agent: String,
    /// Per-attempt request timeout
    pub request_timeout: Duration,
    /// Connect timeout for the underlying HTTP client
    pub connect_timeout: Duration,
    /// Request quota
    pub quota: QuotaConfig,
    /// Retry behavior
    pub retry: RetryConfig,
    /// Retry classification
    pub classifier: ClassifierConfig,
}

impl ClientConfig {
    /// Create a configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Validate all invariants
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        match self.base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ConfigurationError::InvalidBaseUrl(format!(
                    "unsupported scheme '{other}'"
                )))
            }
        }
        self.quota.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    user_agent: Option<String>,
    request_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    quota: Option<QuotaConfig>,
    retry: Option<RetryConfig>,
    classifier: Option<ClassifierConfig>,
}

impl ClientConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL (required)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set the per-attempt request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the quota section
    pub fn quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Set the quota as `max_requests` per `period`
    pub fn quota_per_period(self, max_requests: u32, period: Duration) -> Self {
        self.quota(QuotaConfig::new(max_requests, period))
    }

    /// Set the retry section
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Set the classifier section
    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ClientResult<ClientConfig> {
        let raw_url = self
            .base_url
            .ok_or_else(|| ConfigurationError::InvalidBaseUrl("base URL is required".to_string()))?;
        let base_url = Url::parse(&raw_url)
            .map_err(|e| ConfigurationError::InvalidBaseUrl(format!("{raw_url}: {e}")))?;

        let config = ClientConfig {
            base_url,
            user_agent: self
                .user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            quota: self.quota.unwrap_or_default(),
            retry: self.retry.unwrap_or_default(),
            classifier: self.classifier.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .build()
            .unwrap();

        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert_eq!(config.quota.max_requests, DEFAULT_MAX_REQUESTS);
        assert!(config.classifier.retriable_statuses.contains(&429));
        assert!(config.classifier.non_retriable_statuses.contains(&401));
    }

    #[test]
    fn test_base_url_required() {
        let result = ClientConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let result = ClientConfig::builder()
            .base_url("ftp://api.example.com")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_quota() {
        let result = ClientConfig::builder()
            .base_url("https://api.example.com")
            .quota_per_period(0, Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_inverted_delays() {
        let result = ClientConfig::builder()
            .base_url("https://api.example.com")
            .retry(
                RetryConfig::new()
                    .base_delay(Duration::from_secs(60))
                    .max_delay(Duration::from_secs(1)),
            )
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let result = ClientConfig::builder()
            .base_url("https://api.example.com")
            .retry(RetryConfig::new().max_attempts(0))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_classifier_sets() {
        let config = ClientConfig::builder()
            .base_url("https://api.example.com")
            .classifier(
                ClassifierConfig::new()
                    .retriable_statuses([429, 503])
                    .non_retriable_statuses([401]),
            )
            .build()
            .unwrap();

        assert_eq!(config.classifier.retriable_statuses.len(), 2);
        assert!(!config.classifier.retriable_statuses.contains(&500));
    }
}
