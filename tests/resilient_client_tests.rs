//! Integration tests driving the production transport against a mock
//! HTTP server. These exercise the full pipeline: URL building,
//! credential attachment, status handling, and the retry loop.

use integrations_core::{
    ApiRequest, ClientError, QuotaConfig, ResilientClient, RetryConfig,
};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(server: &MockServer) -> ResilientClient {
    ResilientClient::builder()
        .base_url(server.uri())
        .bearer_token("test-token")
        // Tight quota window so admission waits stay in the millisecond
        // range for real-time tests.
        .quota(QuotaConfig::new(100, Duration::from_millis(100)))
        .retry(
            RetryConfig::new()
                .max_attempts(3)
                .base_delay(Duration::from_millis(10))
                .max_delay(Duration::from_millis(50)),
        )
        .build()
        .expect("client should build")
}

#[tokio::test]
async fn success_attaches_bearer_credential() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pages/p-1"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "p-1", "title": "Home"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let page: serde_json::Value = client.get("/pages/p-1").await.unwrap();

    assert_eq!(page["title"], "Home");
}

#[tokio::test]
async fn transient_server_errors_are_retried_to_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "p-1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let pages: serde_json::Value = client.get("/pages").await.unwrap();

    assert_eq!(pages[0]["id"], "p-1");
}

#[tokio::test]
async fn authentication_failure_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client.execute(ApiRequest::get("/pages")).await.unwrap_err();

    match error {
        ClientError::InvalidRequest { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad credentials");
        }
        other => panic!("expected InvalidRequest, got {other}"),
    }
}

#[tokio::test]
async fn rate_limited_response_waits_out_the_retry_after_hint() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pages/p-1/status"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "1")
                .set_body_string("rate limited"),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/pages/p-1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"state": "published"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let started = Instant::now();
    let response: serde_json::Value = client
        .post("/pages/p-1/status", &json!({"state": "published"}))
        .await
        .unwrap();

    assert_eq!(response["state"], "published");
    // The 10ms configured backoff must not be used; the server said 1s.
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn persistent_failures_exhaust_the_attempt_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/pages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let error = client.execute(ApiRequest::get("/pages")).await.unwrap_err();

    match error {
        ClientError::QuotaExhausted {
            attempts_made,
            last_cause,
        } => {
            assert_eq!(attempts_made, 3);
            assert_eq!(last_cause.status(), Some(500));
        }
        other => panic!("expected QuotaExhausted, got {other}"),
    }
}
