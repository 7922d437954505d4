//! Integration tests for the resilient request layer.
//!
//! These tests drive the client through the scripted transport to verify
//! retry classification, timeouts and backoff without a real backend.

use std::sync::Arc;
use std::time::Duration;

use craft_client::{
    ApiRequest, ClientError, MockReply, ResilientClient, RetryConfig, ScriptedTransport,
};
use serde_json::json;
use tokio::time::Instant;

fn client(transport: &ScriptedTransport, config: RetryConfig) -> ResilientClient {
    ResilientClient::new(Arc::new(transport.clone()), config)
}

/// Test that two 500s followed by a success yield the success.
#[tokio::test(start_paused = true)]
async fn test_recovers_from_server_failures() {
    let transport = ScriptedTransport::new()
        .on("/api/sitemap", MockReply::status(500, "down"))
        .on("/api/sitemap", MockReply::status(502, "gateway"))
        .on("/api/sitemap", MockReply::json(json!({"success": true, "sitemap": []})));

    let client = client(&transport, RetryConfig::default());
    let value = client
        .execute(&ApiRequest::post("/api/sitemap", json!({"userId": "u1", "pages": []})))
        .await
        .unwrap();

    assert_eq!(value["success"], true);
    assert_eq!(transport.calls_to("/api/sitemap").len(), 3);
}

/// Test that a 404 is attempted exactly once.
#[tokio::test(start_paused = true)]
async fn test_not_found_is_fatal() {
    let transport = ScriptedTransport::new().on("/api/styles", MockReply::status(404, "no route"));

    let client = client(&transport, RetryConfig::default());
    let err = client
        .execute(&ApiRequest::post("/api/styles", json!({})))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!err.is_retryable());
    assert_eq!(transport.call_count(), 1);
}

/// Test that a hung request is abandoned and the retry succeeds.
#[tokio::test(start_paused = true)]
async fn test_hung_request_times_out_then_retries() {
    let transport = ScriptedTransport::new()
        .on("/api/chat", MockReply::Hang)
        .on("/api/chat", MockReply::json(json!({"content": []})));

    let config = RetryConfig::new().with_timeout_ms(1_000).with_base_delay_ms(200);
    let client = client(&transport, config);

    let started = Instant::now();
    client
        .execute(&ApiRequest::post("/api/chat", json!({"messages": []})))
        .await
        .unwrap();

    assert_eq!(transport.calls_to("/api/chat").len(), 2);
    assert!(started.elapsed() >= Duration::from_millis(1_200));
}

/// Test that slow but in-time replies are not treated as timeouts.
#[tokio::test(start_paused = true)]
async fn test_slow_reply_within_timeout() {
    let transport = ScriptedTransport::new().on(
        "/api/finalize",
        MockReply::json(json!({"success": true})).delayed(Duration::from_millis(900)),
    );

    let client = client(&transport, RetryConfig::new().with_timeout_ms(1_000));
    client
        .execute(&ApiRequest::post("/api/finalize", json!({})))
        .await
        .unwrap();
    assert_eq!(transport.call_count(), 1);
}

/// Test that every attempt timing out surfaces a timeout.
#[tokio::test(start_paused = true)]
async fn test_all_attempts_time_out() {
    let transport = ScriptedTransport::new()
        .on("/api/metadata", MockReply::Hang)
        .on("/api/metadata", MockReply::Hang)
        .on("/api/metadata", MockReply::Hang);

    let client = client(&transport, RetryConfig::new().with_timeout_ms(100));
    let err = client
        .execute(&ApiRequest::post("/api/metadata", json!({})))
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::Timeout { after_ms: 100 });
    assert_eq!(transport.call_count(), 3);
}
