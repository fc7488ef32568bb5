//! Tests for ordered failover.

use super::*;
use crate::test_support::ScriptedAttempter;

const D1: &str = "https://d1.test/hook";
const D2: &str = "https://d2.test/hook";
const D3: &str = "https://d3.test/hook";
const SELF_URL: &str = "https://relay.test/api/w/loop123";

fn forwarder(attempter: &ScriptedAttempter) -> FailoverForwarder {
    let guard = LoopGuard::from_base_urls(["https://relay.test"]).unwrap();
    FailoverForwarder::new(Arc::new(attempter.clone()), Arc::new(guard))
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

async fn forward(forwarder: &FailoverForwarder, destinations: &[&str]) -> DeliveryOutcome {
    forwarder
        .forward(
            &urls(destinations),
            "POST",
            &HeaderSet::new(),
            r#"{"a":1}"#,
            Duration::from_secs(1),
        )
        .await
}

#[tokio::test]
async fn test_fails_over_transport_errors_until_a_response() {
    let attempter = ScriptedAttempter::new()
        .fail(D1, "dns failure")
        .fail(D2, "connection refused")
        .respond(D3, 201, "ok");

    let outcome = forward(&forwarder(&attempter), &[D1, D2, D3]).await;

    assert_eq!(outcome.destination_url.as_deref(), Some(D3));
    assert_eq!(outcome.status_code, Some(201));
    assert_eq!(outcome.response_body.as_deref(), Some("ok"));
    assert!(outcome.error.is_none());
    assert!(outcome.forwarded_at.is_some());
    assert_eq!(attempter.called_urls(), urls(&[D1, D2, D3]));
}

#[tokio::test]
async fn test_error_status_is_terminal() {
    let attempter = ScriptedAttempter::new()
        .respond(D1, 500, "internal")
        .respond(D2, 200, "never");

    let outcome = forward(&forwarder(&attempter), &[D1, D2]).await;

    assert_eq!(outcome.destination_url.as_deref(), Some(D1));
    assert_eq!(outcome.status_code, Some(500));
    assert!(outcome.is_delivered());
    assert!(!outcome.is_success());
    assert_eq!(attempter.called_urls(), urls(&[D1]));
}

#[tokio::test]
async fn test_last_failure_is_kept_when_all_fail() {
    let attempter = ScriptedAttempter::new()
        .fail(D1, "first")
        .fail(D2, "second");

    let outcome = forward(&forwarder(&attempter), &[D1, D2]).await;

    assert_eq!(outcome.error.as_deref(), Some("second"));
    assert_eq!(outcome.destination_url.as_deref(), Some(D2));
    assert_eq!(outcome.status_code, None);
    assert_eq!(outcome.response_time_ms, Some(7));
}

#[tokio::test]
async fn test_empty_destination_list_makes_no_attempt() {
    let attempter = ScriptedAttempter::new();

    let outcome = forward(&forwarder(&attempter), &[]).await;

    assert_eq!(outcome, DeliveryOutcome::no_destinations());
    assert_eq!(outcome.status_code, Some(NO_DESTINATIONS_STATUS));
    assert!(attempter.calls().is_empty());
}

#[tokio::test]
async fn test_self_reference_alone_is_refused_without_http_call() {
    let attempter = ScriptedAttempter::new().respond(SELF_URL, 200, "loop");

    let outcome = forward(&forwarder(&attempter), &[SELF_URL]).await;

    assert_eq!(outcome.error.as_deref(), Some(SELF_REFERENCE_ERROR));
    assert!(outcome.forwarded_at.is_none());
    assert!(attempter.calls().is_empty());
}

#[tokio::test]
async fn test_trailing_refusal_keeps_earlier_attempt_time() {
    let attempter = ScriptedAttempter::new().fail(D1, "timed out");

    let outcome = forward(&forwarder(&attempter), &[D1, SELF_URL]).await;

    assert_eq!(outcome.error.as_deref(), Some(SELF_REFERENCE_ERROR));
    assert_eq!(outcome.destination_url.as_deref(), Some(SELF_URL));
    assert!(outcome.forwarded_at.is_some());
}

#[tokio::test]
async fn test_self_reference_is_skipped_in_favour_of_next_destination() {
    let attempter = ScriptedAttempter::new().respond(D2, 202, "accepted");

    let outcome = forward(&forwarder(&attempter), &[SELF_URL, D2]).await;

    assert_eq!(outcome.destination_url.as_deref(), Some(D2));
    assert_eq!(outcome.status_code, Some(202));
    assert_eq!(attempter.called_urls(), urls(&[D2]));
}

#[tokio::test]
async fn test_request_is_passed_through_unchanged() {
    let attempter = ScriptedAttempter::new().respond(D1, 200, "");
    let mut headers = HeaderSet::new();
    headers.insert("x-custom".to_string(), "1".to_string());

    forwarder(&attempter)
        .forward(&urls(&[D1]), "PATCH", &headers, "payload", Duration::from_secs(9))
        .await;

    let call = &attempter.calls()[0];
    assert_eq!(call.method, "PATCH");
    assert_eq!(call.body, "payload");
    assert_eq!(call.headers, headers);
    assert_eq!(call.timeout, Duration::from_secs(9));
}
