//! The resilient client: admission, execution, classification, retry.
//!
//! One [`ResilientClient`] owns the full lifecycle of a logical call.
//! Each call moves through a fixed set of states: throttled on the
//! shared rate limiter, in flight on the transport, then succeeded,
//! retry-scheduled, or failed. Every transition is reported to the
//! configured observer. A retry consumes a fresh rate-limit slot; it is
//! never exempt from throttling.

use crate::auth::{CredentialProvider, StaticCredentialProvider};
use crate::config::{ClassifierConfig, ClientConfig, ClientConfigBuilder, QuotaConfig, RetryConfig};
use crate::errors::{
    ClientError, ClientResult, ConfigurationError, CredentialError, RemoteRejection,
    ResponseError, TransportFailure,
};
use crate::observability::{CallEvent, CallObserver, CallState, TracingObserver};
use crate::resilience::{BackoffScheduler, Classification, ErrorClassifier, RateLimiter};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use url::Url;
use uuid::Uuid;

/// One logical request against the remote API
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path below the configured base URL
    pub path: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// Extra request headers
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<Bytes>,
}

impl ApiRequest {
    /// Create a request with the given method and path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a PUT request
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Create a PATCH request
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Add a header
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attach a JSON body
    pub fn json<B: Serialize>(mut self, body: &B) -> ClientResult<Self> {
        let bytes = serde_json::to_vec(body).map_err(|e| ResponseError::Serialization {
            message: e.to_string(),
        })?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Attach a raw body with an explicit content type
    pub fn body(mut self, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = Some(body.into());
        self
    }
}

/// Terminal payload of a successful call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx)
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ResponseError::Deserialization {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Body decoded as UTF-8, lossily
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// What to do after a failed attempt
enum RetryDirective {
    /// Sleep `wait`, then run another attempt
    Retry { wait: Duration, status: Option<u16> },
    /// Give up with a terminal error
    Stop(ClientError),
}

/// Resilient client around one remote API
pub struct ResilientClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialProvider>,
    limiter: Arc<RateLimiter>,
    backoff: BackoffScheduler,
    classifier: ErrorClassifier,
    observer: Arc<dyn CallObserver>,
    default_headers: HeaderMap,
}

impl ResilientClient {
    /// Create a client with the production transport and default observer
    pub fn new(
        config: ClientConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> ClientResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.connect_timeout)?);
        Self::with_parts(config, transport, credentials, None, None)
    }

    /// Create a client builder
    pub fn builder() -> ResilientClientBuilder {
        ResilientClientBuilder::new()
    }

    /// Create a client from explicit parts.
    ///
    /// `limiter` selects the quota-sharing policy: `None` gives this
    /// client a private limiter built from `config.quota`; passing a
    /// shared instance makes this client draw from that quota instead,
    /// and `config.quota` is ignored. Clients for distinct upstream
    /// identities get independent limiters by construction; nothing here
    /// is process-global.
    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialProvider>,
        limiter: Option<Arc<RateLimiter>>,
        observer: Option<Arc<dyn CallObserver>>,
    ) -> ClientResult<Self> {
        config.validate()?;

        let limiter = limiter.unwrap_or_else(|| {
            Arc::new(RateLimiter::new(
                config.quota.max_requests,
                config.quota.period,
            ))
        });

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let user_agent = HeaderValue::from_str(&config.user_agent).map_err(|_| {
            ConfigurationError::InvalidValue {
                message: "user_agent contains invalid header characters".to_string(),
            }
        })?;
        default_headers.insert(USER_AGENT, user_agent);

        Ok(Self {
            backoff: BackoffScheduler::new(&config.retry),
            classifier: ErrorClassifier::new(&config.classifier),
            observer: observer.unwrap_or_else(|| Arc::new(TracingObserver)),
            default_headers,
            config,
            transport,
            credentials,
            limiter,
        })
    }

    /// The client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The rate limiter backing this client.
    ///
    /// Hand the returned `Arc` to another client's builder to make both
    /// draw from the same upstream quota.
    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    // Convenience verbs

    /// GET a JSON payload
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// POST a JSON body, decode a JSON payload
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.execute(ApiRequest::post(path).json(body)?).await?.json()
    }

    /// PUT a JSON body, decode a JSON payload
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.execute(ApiRequest::put(path).json(body)?).await?.json()
    }

    /// PATCH a JSON body, decode a JSON payload
    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.execute(ApiRequest::patch(path).json(body)?).await?.json()
    }

    /// DELETE, discarding any response body
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.execute(ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Execute one logical call end to end.
    ///
    /// Admission and backoff are the only suspension points; dropping the
    /// returned future while suspended abandons the call without
    /// consuming a rate-limit slot.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn execute(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let call_id = Uuid::new_v4();
        let url = self.build_url(&request.path, &request.query)?;
        let mut attempt: u32 = 1;

        loop {
            let waited = self.limiter.acquire().await;
            self.emit(call_id, CallState::Throttled, attempt, Some(waited), None, None);

            match self.attempt_once(call_id, attempt, &request, &url).await {
                Ok(response) => {
                    self.emit(
                        call_id,
                        CallState::Succeeded,
                        attempt,
                        None,
                        Some(response.status),
                        None,
                    );
                    return Ok(response);
                }
                Err(failure) => match self.decide(failure, attempt) {
                    RetryDirective::Retry { wait, status } => {
                        self.emit(
                            call_id,
                            CallState::RetryScheduled,
                            attempt,
                            Some(wait),
                            status,
                            None,
                        );
                        tokio::time::sleep(wait).await;
                        attempt += 1;
                    }
                    RetryDirective::Stop(error) => {
                        self.emit(
                            call_id,
                            CallState::Failed,
                            attempt,
                            None,
                            error.status(),
                            Some(error.error_code()),
                        );
                        return Err(error);
                    }
                },
            }
        }
    }

    /// Run one physical attempt: credential, headers, transport, status check
    async fn attempt_once(
        &self,
        call_id: Uuid,
        attempt: u32,
        request: &ApiRequest,
        url: &str,
    ) -> ClientResult<ApiResponse> {
        let credential = self.credentials.credential().await?;

        let mut headers = self.default_headers.clone();
        for (name, value) in request.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        let auth_value = HeaderValue::from_str(&credential.header_value()).map_err(|_| {
            CredentialError::ProviderFailed {
                message: "credential contains invalid header characters".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth_value);

        self.emit(call_id, CallState::InFlight, attempt, None, None, None);

        let transport_request = TransportRequest {
            method: request.method.clone(),
            url: url.to_string(),
            headers,
            body: request.body.clone(),
            timeout: self.config.request_timeout,
        };

        let send = self.transport.send(transport_request);
        let response = match tokio::time::timeout(self.config.request_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(failure)) => return Err(failure.into()),
            Err(_) => return Err(TransportFailure::Timeout.into()),
        };

        if response.is_success() {
            return Ok(ApiResponse {
                status: response.status,
                headers: response.headers,
                body: response.body,
            });
        }

        let mut rejection = RemoteRejection::new(response.status, response.body_text());
        if let Some(hint) = response.retry_after() {
            rejection = rejection.with_retry_after(hint);
        }
        Err(rejection.into())
    }

    /// Classify a failed attempt and pick the next step
    fn decide(&self, failure: ClientError, attempt: u32) -> RetryDirective {
        match self.classifier.classify(&failure) {
            Classification::NonRetriable => {
                let error = match failure {
                    ClientError::Rejection(rejection) => ClientError::InvalidRequest {
                        status: rejection.status,
                        body: rejection.body,
                    },
                    other => other,
                };
                RetryDirective::Stop(error)
            }
            Classification::Retriable { server_hint } => {
                if attempt < self.config.retry.max_attempts {
                    RetryDirective::Retry {
                        wait: self.backoff.delay(attempt, server_hint),
                        status: failure.status(),
                    }
                } else {
                    RetryDirective::Stop(ClientError::QuotaExhausted {
                        attempts_made: attempt,
                        last_cause: Box::new(failure),
                    })
                }
            }
        }
    }

    fn build_url(&self, path: &str, query: &[(String, String)]) -> ClientResult<String> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}")).map_err(|e| {
            ConfigurationError::InvalidBaseUrl(format!("cannot build URL for '{path}': {e}"))
        })?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url.into())
    }

    fn emit(
        &self,
        call_id: Uuid,
        state: CallState,
        attempt: u32,
        waited: Option<Duration>,
        status: Option<u16>,
        error_code: Option<&'static str>,
    ) {
        self.observer.on_transition(&CallEvent {
            call_id,
            state,
            attempt,
            waited,
            status,
            error_code,
        });
    }
}

impl std::fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("limiter", &self.limiter)
            .finish()
    }
}

/// Builder for [`ResilientClient`]
pub struct ResilientClientBuilder {
    config_builder: ClientConfigBuilder,
    transport: Option<Arc<dyn Transport>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    limiter: Option<Arc<RateLimiter>>,
    observer: Option<Arc<dyn CallObserver>>,
}

impl ResilientClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config_builder: ClientConfig::builder(),
            transport: None,
            credentials: None,
            limiter: None,
            observer: None,
        }
    }

    /// Set the base URL (required)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(url);
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.user_agent(ua);
        self
    }

    /// Set the per-attempt request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.request_timeout(timeout);
        self
    }

    /// Set the request quota
    pub fn quota(mut self, quota: QuotaConfig) -> Self {
        self.config_builder = self.config_builder.quota(quota);
        self
    }

    /// Set the retry configuration
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config_builder = self.config_builder.retry(retry);
        self
    }

    /// Set the classifier configuration
    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.config_builder = self.config_builder.classifier(classifier);
        self
    }

    /// Authenticate with a fixed bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.credentials = Some(Arc::new(StaticCredentialProvider::new(token)));
        self
    }

    /// Set the credential provider
    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Inject a transport (tests, alternative HTTP stacks)
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Draw from an existing quota instead of a private one.
    ///
    /// All clients sharing one upstream quota must share one limiter
    /// instance; when this is set the builder's own quota settings are
    /// ignored.
    pub fn shared_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Set the observability sink
    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Build the client
    pub fn build(self) -> ClientResult<ResilientClient> {
        let config = self.config_builder.build()?;
        let credentials = self.credentials.ok_or(CredentialError::Missing)?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.connect_timeout)?),
        };

        ResilientClient::with_parts(config, transport, credentials, self.limiter, self.observer)
    }
}

impl Default for ResilientClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ResilientClient {
        ResilientClient::builder()
            .base_url("https://api.example.com/v2")
            .bearer_token("token")
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_url_joins_path() {
        let client = client();
        assert_eq!(
            client.build_url("/pages", &[]).unwrap(),
            "https://api.example.com/v2/pages"
        );
        assert_eq!(
            client.build_url("pages", &[]).unwrap(),
            "https://api.example.com/v2/pages"
        );
    }

    #[test]
    fn test_build_url_appends_query() {
        let client = client();
        let url = client
            .build_url("/pages", &[("limit".to_string(), "10".to_string())])
            .unwrap();
        assert_eq!(url, "https://api.example.com/v2/pages?limit=10");
    }

    #[test]
    fn test_json_request_sets_content_type() {
        let request = ApiRequest::post("/status")
            .json(&serde_json::json!({"state": "published"}))
            .unwrap();

        assert_eq!(
            request.headers.get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert!(request.body.is_some());
    }

    #[test]
    fn test_builder_requires_credentials() {
        let result = ResilientClient::builder()
            .base_url("https://api.example.com")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_decide_wraps_exhaustion_with_last_cause() {
        let client = client();
        let failure = ClientError::from(RemoteRejection::new(503, "unavailable"));

        // Default retry config allows three attempts.
        match client.decide(failure, 3) {
            RetryDirective::Stop(ClientError::QuotaExhausted {
                attempts_made,
                last_cause,
            }) => {
                assert_eq!(attempts_made, 3);
                assert_eq!(last_cause.status(), Some(503));
            }
            _ => panic!("expected terminal exhaustion"),
        }
    }

    #[test]
    fn test_decide_converts_non_retriable_rejection() {
        let client = client();
        let failure = ClientError::from(RemoteRejection::new(403, "forbidden"));

        match client.decide(failure, 1) {
            RetryDirective::Stop(ClientError::InvalidRequest { status, body }) => {
                assert_eq!(status, 403);
                assert_eq!(body, "forbidden");
            }
            _ => panic!("expected immediate terminal error"),
        }
    }

    #[test]
    fn test_decide_honors_server_hint() {
        let client = client();
        let failure = ClientError::from(
            RemoteRejection::new(429, "slow down").with_retry_after(Duration::from_secs(9)),
        );

        match client.decide(failure, 1) {
            RetryDirective::Retry { wait, status } => {
                assert_eq!(wait, Duration::from_secs(9));
                assert_eq!(status, Some(429));
            }
            _ => panic!("expected a scheduled retry"),
        }
    }
}
