//! Integration tests for ingestion and failover forwarding

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{body_json, body_text, webhook, MockAttempter, TestService};
use hook_keeper_core::InMemoryStorage;
use std::sync::Arc;

fn service() -> (TestService, MockAttempter) {
    let attempter = MockAttempter::new();
    let service = TestService::new(
        Arc::new(InMemoryStorage::new()),
        Arc::new(attempter.clone()),
    );
    (service, attempter)
}

/// A destination that answers with an error status ends the walk
#[tokio::test]
async fn test_error_status_stops_failover() {
    // Arrange
    let (service, attempter) = service();
    let hook = webhook("orders", &["https://d1.test", "https://d2.test", "https://d3.test"]);
    service.add_webhook(&hook).await;
    attempter.fail("https://d1.test", "connection refused");
    attempter.respond("https://d2.test", 500, "{\"error\":\"boom\"}");
    attempter.respond("https://d3.test", 201, "created");

    // Act
    let response = service.ingest("orders", "{}").await;

    // Assert
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "{\"error\":\"boom\"}");
    assert_eq!(
        attempter.called_urls(),
        vec!["https://d1.test", "https://d2.test"]
    );

    let outcome = service.records(&hook).await[0].outcome.clone().unwrap();
    assert_eq!(outcome.status_code, Some(500));
    assert_eq!(outcome.destination_url.as_deref(), Some("https://d2.test"));
}

/// Transport failures move on to the next destination
#[tokio::test]
async fn test_transport_failures_fail_over_in_order() {
    // Arrange
    let (service, attempter) = service();
    let hook = webhook("orders", &["https://d1.test", "https://d2.test", "https://d3.test"]);
    service.add_webhook(&hook).await;
    attempter.fail("https://d1.test", "dns error");
    attempter.fail("https://d2.test", "timed out");
    attempter.respond("https://d3.test", 201, "created");

    // Act
    let response = service.ingest("orders", "{}").await;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_text(response).await, "created");
    assert_eq!(attempter.calls().len(), 3);
    let records = service.records(&hook).await;
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].outcome.as_ref().unwrap().destination_url.as_deref(),
        Some("https://d3.test")
    );
}

/// When nobody answers, the last failure is reported
#[tokio::test]
async fn test_all_failures_report_last_error() {
    // Arrange
    let (service, attempter) = service();
    let hook = webhook("orders", &["https://d1.test", "https://d2.test"]);
    service.add_webhook(&hook).await;
    attempter.fail("https://d1.test", "dns error");
    attempter.fail("https://d2.test", "timed out");

    // Act
    let response = service.ingest("orders", "{}").await;

    // Assert
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["details"], "timed out");
    let outcome = service.records(&hook).await[0].outcome.clone().unwrap();
    assert_eq!(outcome.error.as_deref(), Some("timed out"));
    assert_eq!(outcome.destination_url.as_deref(), Some("https://d2.test"));
    assert!(outcome.status_code.is_none());
}

/// Self-referencing destinations are skipped without an HTTP call
#[tokio::test]
async fn test_self_reference_is_skipped_and_next_destination_used() {
    // Arrange
    let (service, attempter) = service();
    let hook = webhook(
        "looping",
        &["https://relay.example.com/api/w/looping", "https://d2.test"],
    );
    service.add_webhook(&hook).await;
    attempter.respond("https://d2.test", 200, "ok");

    // Act
    let response = service.ingest("looping", "{}").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(attempter.called_urls(), vec!["https://d2.test"]);
}

/// The outbound header set is sanitized and extended
#[tokio::test]
async fn test_forwarded_headers_are_sanitized() {
    // Arrange
    let (service, attempter) = service();
    let hook = webhook("headers", &["https://d1.test"])
        .with_custom_header("Authorization", "Bearer destination-token")
        .with_custom_header("X-Webhook-Source", "custom-source");
    service.add_webhook(&hook).await;
    attempter.respond("https://d1.test", 200, "ok");

    let request = Request::builder()
        .method("POST")
        .uri("/api/w/headers?x=1")
        .header("host", "inbound.example.com")
        .header("connection", "keep-alive")
        .header("x-original-host", "spoofed.example.com")
        .header("x-resend", "true")
        .header("x-github-event", "push")
        .body(Body::from("{\"a\":1}"))
        .unwrap();

    // Act
    let response = service.send(request).await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let sent = &attempter.calls()[0];
    assert_eq!(sent.method, "POST");
    assert_eq!(sent.body, "{\"a\":1}");
    assert!(!sent.headers.contains_key("host"));
    assert!(!sent.headers.contains_key("connection"));
    assert!(!sent.headers.contains_key("x-resend"));
    assert_eq!(sent.headers["x-original-host"], "inbound.example.com");
    assert_eq!(sent.headers["x-forwarded-for"], "127.0.0.1");
    assert_eq!(sent.headers["content-type"], "application/json");
    assert_eq!(sent.headers["x-github-event"], "push");
    assert_eq!(sent.headers["authorization"], "Bearer destination-token");
    assert_eq!(sent.headers["x-webhook-source"], "custom-source");

    // The ledger keeps the headers as received
    let record = &service.records(&hook).await[0];
    assert_eq!(record.headers["host"], "inbound.example.com");
    assert_eq!(record.headers["x-resend"], "true");
}

/// Method allowlist and activity are checked before anything is recorded
#[tokio::test]
async fn test_rejected_requests_leave_no_trace() {
    // Arrange
    let (service, attempter) = service();
    let restricted = webhook("restricted", &["https://d1.test"]).with_allowed_methods(["post"]);
    let inactive = webhook("inactive", &["https://d1.test"]).with_active(false);
    service.add_webhook(&restricted).await;
    service.add_webhook(&inactive).await;

    // Act
    let wrong_method = service
        .send(
            Request::builder()
                .method("GET")
                .uri("/api/w/restricted")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    let disabled = service.ingest("inactive", "{}").await;

    // Assert
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body_json(wrong_method).await["allowedMethods"],
        serde_json::json!(["POST"])
    );
    assert_eq!(disabled.status(), StatusCode::NOT_FOUND);
    assert!(service.records(&restricted).await.is_empty());
    assert!(service.records(&inactive).await.is_empty());
    assert!(attempter.calls().is_empty());
}

/// GET requests are forwarded without a body
#[tokio::test]
async fn test_get_request_is_forwarded_with_query_recorded() {
    // Arrange
    let (service, attempter) = service();
    let hook = webhook("polling", &["https://d1.test"]);
    service.add_webhook(&hook).await;
    attempter.respond("https://d1.test", 204, "");

    // Act
    let response = service
        .send(
            Request::builder()
                .method("GET")
                .uri("/api/w/polling?challenge=abc&mode=subscribe")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(attempter.calls()[0].method, "GET");
    let record = &service.records(&hook).await[0];
    assert_eq!(record.method, "GET");
    assert_eq!(record.query["challenge"], "abc");
    assert_eq!(record.query["mode"], "subscribe");
}
