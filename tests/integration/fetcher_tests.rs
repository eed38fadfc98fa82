//! Integration tests for the rate-limited fetcher
//!
//! These tests use wiremock to simulate rate-limit responses and permanent
//! failures from the remote API.

use serde_json::json;
use social_ripple::remote::{build_http_client, RateLimitedFetcher};
use social_ripple::FetchError;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(max_wait: Duration) -> RateLimitedFetcher {
    let client = build_http_client(
        "social-ripple-test/1.0",
        Duration::from_secs(5),
        Some("test-token"),
        Some("application/json"),
    )
    .unwrap();
    RateLimitedFetcher::new(client, Duration::from_millis(10), max_wait)
}

#[tokio::test]
async fn test_retries_after_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/alice"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"login": "alice"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/users/alice", mock_server.uri());
    let body: serde_json::Value = fetcher(Duration::from_secs(5)).get_json(&url).await.unwrap();

    assert_eq!(body["login"], "alice");
}

#[tokio::test]
async fn test_exhausted_quota_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "0"),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rate_limit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resources": {}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Reset lies in the past, so each wait is one second; capped to zero here
    let url = format!("{}/rate_limit", mock_server.uri());
    let result: Result<serde_json::Value, _> = fetcher(Duration::ZERO).get_json(&url).await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_plain_forbidden_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/blocked"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("x-ratelimit-remaining", "4999")
                .set_body_string("forbidden"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/users/blocked", mock_server.uri());
    let result: Result<serde_json::Value, _> = fetcher(Duration::from_secs(5)).get_json(&url).await;

    match result {
        Err(FetchError::Status { status, body, .. }) => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&mock_server)
        .await;

    let url = format!("{}/users/broken", mock_server.uri());
    let result: Result<serde_json::Value, _> = fetcher(Duration::from_secs(5)).get_json(&url).await;

    assert!(matches!(result, Err(FetchError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_not_found() {
    let mock_server = MockServer::start().await;

    let url = format!("{}/users/ghost", mock_server.uri());
    let result: Result<serde_json::Value, _> = fetcher(Duration::from_secs(5)).get_json(&url).await;

    assert!(result.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_malformed_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
        .mount(&mock_server)
        .await;

    let url = format!("{}/users/garbled", mock_server.uri());
    let result: Result<serde_json::Value, _> = fetcher(Duration::from_secs(5)).get_json(&url).await;

    assert!(matches!(result, Err(FetchError::Malformed { .. })));
}

#[tokio::test]
async fn test_timeout_is_permanent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"login": "slow"}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let client = build_http_client(
        "social-ripple-test/1.0",
        Duration::from_millis(200),
        None,
        None,
    )
    .unwrap();
    let fetcher = RateLimitedFetcher::new(client, Duration::from_millis(10), Duration::from_secs(1));

    let url = format!("{}/users/slow", mock_server.uri());
    let result: Result<serde_json::Value, _> = fetcher.get_json(&url).await;

    assert!(matches!(result, Err(FetchError::Timeout { .. })));
}
