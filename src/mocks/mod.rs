//! Mock transport for exercising the client without a network.
//!
//! Responses are scripted in order; once the script is exhausted the
//! transport keeps serving its default response. Every physical attempt
//! is recorded, including the instant it reached the transport, which is
//! what the rate-bound tests measure.

use crate::errors::TransportFailure;
use crate::transport::{Transport, TransportRequest, TransportResponse};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, RETRY_AFTER};
use http::{HeaderMap, HeaderValue, Method};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// A scripted response
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Status code to return
    pub status: u16,
    /// Body to return
    pub body: Bytes,
    /// Headers to return
    pub headers: HeaderMap,
    /// Simulated processing time before responding
    pub delay: Option<Duration>,
}

impl MockResponse {
    /// Create a response with the given status and body
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: HeaderMap::new(),
            delay: None,
        }
    }

    /// A 200 response with an empty JSON object body
    pub fn ok() -> Self {
        Self::new(200, "{}")
    }

    /// Attach a Retry-After header in whole seconds
    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&seconds.to_string()).unwrap(),
        );
        self
    }

    /// Attach a header
    pub fn header(mut self, name: http::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Respond only after `delay` has elapsed
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// A scripted transport-level failure
#[derive(Debug, Clone)]
enum MockFailure {
    Timeout,
    ConnectionFailed(String),
}

impl MockFailure {
    fn to_failure(&self) -> TransportFailure {
        match self {
            Self::Timeout => TransportFailure::Timeout,
            Self::ConnectionFailed(message) => TransportFailure::ConnectionFailed {
                message: message.clone(),
            },
        }
    }
}

#[derive(Debug, Clone)]
enum MockStep {
    Respond(MockResponse),
    Fail(MockFailure),
}

/// One recorded physical attempt
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// Whether an Authorization header was attached. The value itself is
    /// never stored.
    pub has_authorization: bool,
    /// Request body
    pub body: Option<Bytes>,
    /// When the attempt reached the transport
    pub received_at: Instant,
}

/// Scripted [`Transport`] implementation
pub struct MockTransport {
    steps: Mutex<VecDeque<MockStep>>,
    default_response: MockResponse,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    /// Create a transport that answers 200 `{}` until scripted otherwise
    pub fn new() -> Self {
        Self::with_default(MockResponse::ok())
    }

    /// Create a transport with a custom default response
    pub fn with_default(default_response: MockResponse) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            default_response,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script the next response
    pub fn enqueue(&self, response: MockResponse) -> &Self {
        self.steps.lock().push_back(MockStep::Respond(response));
        self
    }

    /// Script the next response as a bare status and body
    pub fn enqueue_status(&self, status: u16, body: &str) -> &Self {
        self.enqueue(MockResponse::new(status, body.to_string()))
    }

    /// Script a request timeout
    pub fn enqueue_timeout(&self) -> &Self {
        self.steps
            .lock()
            .push_back(MockStep::Fail(MockFailure::Timeout));
        self
    }

    /// Script a connection failure
    pub fn enqueue_connection_failure(&self, message: &str) -> &Self {
        self.steps
            .lock()
            .push_back(MockStep::Fail(MockFailure::ConnectionFailed(
                message.to_string(),
            )));
        self
    }

    /// Number of physical attempts received
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// All recorded attempts, in arrival order
    pub fn recorded(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Instants at which attempts reached the transport
    pub fn arrival_instants(&self) -> Vec<Instant> {
        self.requests.lock().iter().map(|r| r.received_at).collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportFailure> {
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url,
            has_authorization: request.headers.contains_key(AUTHORIZATION),
            body: request.body,
            received_at: Instant::now(),
        });

        let step = self
            .steps
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockStep::Respond(self.default_response.clone()));

        match step {
            MockStep::Respond(response) => {
                if let Some(delay) = response.delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(TransportResponse {
                    status: response.status,
                    headers: response.headers,
                    body: response.body,
                })
            }
            MockStep::Fail(failure) => Err(failure.to_failure()),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("pending_steps", &self.steps.lock().len())
            .field("requests_seen", &self.request_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransportRequest {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        TransportRequest {
            method: Method::GET,
            url: "https://api.example.com/pages".to_string(),
            headers,
            body: None,
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_scripted_then_default() {
        let transport = MockTransport::new();
        transport.enqueue_status(503, "down");

        let first = transport.send(request()).await.unwrap();
        assert_eq!(first.status, 503);

        let second = transport.send(request()).await.unwrap();
        assert_eq!(second.status, 200);
    }

    #[tokio::test]
    async fn test_records_without_credential_value() {
        let transport = MockTransport::new();
        transport.send(request()).await.unwrap();

        let recorded = transport.recorded();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].has_authorization);
        assert_eq!(format!("{:?}", recorded[0]).contains("secret"), false);
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let transport = MockTransport::new();
        transport.enqueue_timeout();

        let result = transport.send(request()).await;
        assert!(matches!(result, Err(TransportFailure::Timeout)));
    }

    #[tokio::test]
    async fn test_retry_after_header_roundtrip() {
        let transport = MockTransport::new();
        transport.enqueue(MockResponse::new(429, "slow down").retry_after(7));

        let response = transport.send(request()).await.unwrap();
        assert_eq!(response.retry_after(), Some(Duration::from_secs(7)));
    }
}
