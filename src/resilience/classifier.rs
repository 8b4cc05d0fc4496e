//! Retry classification of attempt failures.

use crate::config::ClassifierConfig;
use crate::errors::{ClientError, TransportFailure};
use std::collections::HashSet;
use std::time::Duration;

/// Verdict on one attempt failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Re-attempting is expected to help
    Retriable {
        /// Explicit wait instruction from the remote, if it supplied one
        server_hint: Option<Duration>,
    },
    /// Re-attempting cannot help; fail immediately
    NonRetriable,
}

impl Classification {
    /// True for the retriable verdict
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Retriable { .. })
    }
}

/// Maps a failure signal to exactly one [`Classification`].
///
/// Timeouts and connection failures are always retriable. Statuses are
/// looked up in the configured sets, non-retriable winning on overlap;
/// anything unrecognized is non-retriable, so unknown conditions fail
/// fast instead of retrying indefinitely.
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    retriable_statuses: HashSet<u16>,
    non_retriable_statuses: HashSet<u16>,
}

impl ErrorClassifier {
    /// Build a classifier from configuration
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            retriable_statuses: config.retriable_statuses.clone(),
            non_retriable_statuses: config.non_retriable_statuses.clone(),
        }
    }

    /// Classify one attempt failure
    pub fn classify(&self, failure: &ClientError) -> Classification {
        match failure {
            ClientError::Transport(TransportFailure::Timeout)
            | ClientError::Transport(TransportFailure::ConnectionFailed { .. }) => {
                Classification::Retriable { server_hint: None }
            }
            ClientError::Rejection(rejection) => {
                if self.non_retriable_statuses.contains(&rejection.status) {
                    Classification::NonRetriable
                } else if self.retriable_statuses.contains(&rejection.status) {
                    Classification::Retriable {
                        server_hint: rejection.retry_after,
                    }
                } else {
                    Classification::NonRetriable
                }
            }
            _ => Classification::NonRetriable,
        }
    }
}
