//! Error types for the resilient client core.
//!
//! The hierarchy separates per-attempt failure signals (transport
//! failures, remote rejections) from terminal outcomes (quota
//! exhaustion, non-retriable rejections). Retry decisions are made by
//! the classifier in `resilience`; nothing here decides policy.

use std::time::Duration;
use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Root error type for the client core
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Credential error
    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    /// Transport-level failure (timeout, connection)
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportFailure),

    /// Non-2xx response from the remote, status and body attached
    #[error("Remote rejection: {0}")]
    Rejection(#[from] RemoteRejection),

    /// Terminal: the request was rejected with a non-retriable status
    #[error("Invalid request (HTTP {status}): {body}")]
    InvalidRequest {
        /// HTTP status code returned by the remote
        status: u16,
        /// Response body, verbatim, for caller diagnosis
        body: String,
    },

    /// Terminal: every configured attempt was spent on retriable failures
    #[error("Attempt budget exhausted after {attempts_made} attempts: {last_cause}")]
    QuotaExhausted {
        /// Physical attempts made before giving up
        attempts_made: u32,
        /// The failure observed on the final attempt
        #[source]
        last_cause: Box<ClientError>,
    },

    /// Response payload could not be decoded
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),
}

impl ClientError {
    /// Stable code identifying the error family, used in observability events
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CORE_CONFIG",
            Self::Credential(_) => "CORE_CREDENTIAL",
            Self::Transport(_) => "CORE_TRANSPORT",
            Self::Rejection(_) => "CORE_REJECTION",
            Self::InvalidRequest { .. } => "CORE_INVALID_REQUEST",
            Self::QuotaExhausted { .. } => "CORE_QUOTA_EXHAUSTED",
            Self::Response(_) => "CORE_RESPONSE",
        }
    }

    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejection(rejection) => Some(rejection.status),
            Self::InvalidRequest { status, .. } => Some(*status),
            Self::QuotaExhausted { last_cause, .. } => last_cause.status(),
            _ => None,
        }
    }

    /// Number of physical attempts behind this terminal error
    ///
    /// Errors raised before the first attempt (configuration, credentials)
    /// report zero.
    pub fn attempts_made(&self) -> Option<u32> {
        match self {
            Self::QuotaExhausted { attempts_made, .. } => Some(*attempts_made),
            _ => None,
        }
    }

    /// Explicit wait instruction supplied by the remote, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Rejection(rejection) => rejection.retry_after,
            _ => None,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Base URL missing or unparseable
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A numeric or duration knob is out of range
    #[error("Invalid configuration: {message}")]
    InvalidValue {
        /// What was wrong
        message: String,
    },

    /// Environment variable lookup failed
    #[error("Environment variable error: {0}")]
    EnvVar(String),
}

/// Credential provider errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// No credential available
    #[error("No credential available")]
    Missing,

    /// Provider failed to produce a credential
    #[error("Credential provider failed: {message}")]
    ProviderFailed {
        /// Provider-supplied detail
        message: String,
    },
}

/// Transport-level failures, raised before any status code exists
#[derive(Error, Debug)]
pub enum TransportFailure {
    /// The attempt exceeded the request timeout
    #[error("Request timed out")]
    Timeout,

    /// TCP/TLS connection could not be established
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Underlying detail
        message: String,
    },

    /// Any other HTTP-layer failure
    #[error("HTTP error: {message}")]
    Http {
        /// Underlying detail
        message: String,
    },
}

impl From<reqwest::Error> for TransportFailure {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            Self::ConnectionFailed {
                message: error.to_string(),
            }
        } else {
            Self::Http {
                message: error.to_string(),
            }
        }
    }
}

/// A non-2xx response, carried as a per-attempt failure signal
#[derive(Error, Debug, Clone)]
#[error("HTTP {status}: {body}")]
pub struct RemoteRejection {
    /// HTTP status code
    pub status: u16,
    /// Response body, verbatim
    pub body: String,
    /// Retry-After value parsed from the response headers, if present
    pub retry_after: Option<Duration>,
}

impl RemoteRejection {
    /// Create a rejection for a status with no wait hint
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    /// Attach an explicit wait hint from the remote
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

/// Payload encoding and decoding errors
#[derive(Error, Debug)]
pub enum ResponseError {
    /// Body was not valid for the expected type
    #[error("Deserialization error: {message}")]
    Deserialization {
        /// Parser detail
        message: String,
    },

    /// Request body could not be encoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Encoder detail
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let rejection = ClientError::from(RemoteRejection::new(500, "boom"));
        assert_eq!(rejection.error_code(), "CORE_REJECTION");

        let invalid = ClientError::InvalidRequest {
            status: 401,
            body: "bad credentials".to_string(),
        };
        assert_eq!(invalid.error_code(), "CORE_INVALID_REQUEST");
    }

    #[test]
    fn test_status_propagates_through_exhaustion() {
        let exhausted = ClientError::QuotaExhausted {
            attempts_made: 3,
            last_cause: Box::new(ClientError::from(RemoteRejection::new(503, "unavailable"))),
        };

        assert_eq!(exhausted.status(), Some(503));
        assert_eq!(exhausted.attempts_made(), Some(3));
    }

    #[test]
    fn test_retry_after_surfaced() {
        let rejection = RemoteRejection::new(429, "slow down")
            .with_retry_after(Duration::from_secs(30));
        let error = ClientError::from(rejection);

        assert_eq!(error.retry_after(), Some(Duration::from_secs(30)));
        assert_eq!(error.status(), Some(429));
    }

    #[test]
    fn test_display_carries_body_verbatim() {
        let invalid = ClientError::InvalidRequest {
            status: 422,
            body: r#"{"error":"missing field"}"#.to_string(),
        };

        let display = format!("{}", invalid);
        assert!(display.contains("422"));
        assert!(display.contains(r#"{"error":"missing field"}"#));
    }
}
