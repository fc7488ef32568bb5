//! Tests for the in-memory storage backend.

use super::*;
use crate::delivery::AttemptResult;
use crate::ledger::CapturedRequest;
use std::time::Duration;

fn webhook(endpoint: &str) -> Webhook {
    Webhook::new(
        endpoint,
        EndpointToken::new(endpoint).unwrap(),
        vec!["https://d1.test".to_string()],
    )
}

fn record(webhook_id: WebhookId) -> RequestRecord {
    RequestRecord::new(
        webhook_id,
        CapturedRequest {
            method: "POST".to_string(),
            body: "{}".to_string(),
            ..Default::default()
        },
    )
}

fn outcome() -> DeliveryOutcome {
    DeliveryOutcome::from_attempt(
        "https://d1.test",
        AttemptResult::Responded {
            status_code: 200,
            body: "ok".to_string(),
            elapsed_ms: 4,
        },
    )
}

// ============================================================================
// Webhook Tests
// ============================================================================

#[tokio::test]
async fn test_webhook_is_found_by_endpoint_and_id() {
    let storage = InMemoryStorage::new();
    let hook = webhook("alpha");
    storage.save_webhook(&hook).await.unwrap();

    let by_endpoint = storage.find_webhook_by_endpoint(&hook.endpoint).await.unwrap();
    let by_id = storage.find_webhook_by_id(hook.id).await.unwrap();

    assert_eq!(by_endpoint, Some(hook.clone()));
    assert_eq!(by_id, Some(hook));
}

#[tokio::test]
async fn test_save_replaces_existing_webhook() {
    let storage = InMemoryStorage::new();
    let hook = webhook("alpha");
    storage.save_webhook(&hook).await.unwrap();

    let renamed = Webhook {
        name: "renamed".to_string(),
        ..hook.clone()
    };
    storage.save_webhook(&renamed).await.unwrap();

    let stored = storage.find_webhook_by_id(hook.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "renamed");
}

#[tokio::test]
async fn test_duplicate_endpoint_is_a_conflict() {
    let storage = InMemoryStorage::new();
    storage.save_webhook(&webhook("alpha")).await.unwrap();

    let result = storage.save_webhook(&webhook("alpha")).await;

    assert!(matches!(result, Err(StorageError::Conflict { .. })));
}

#[tokio::test]
async fn test_delete_cascades_to_records() {
    let storage = InMemoryStorage::new();
    let doomed = webhook("doomed");
    let kept = webhook("kept");
    storage.save_webhook(&doomed).await.unwrap();
    storage.save_webhook(&kept).await.unwrap();
    storage.create_request_record(&record(doomed.id)).await.unwrap();
    storage.create_request_record(&record(doomed.id)).await.unwrap();
    storage.create_request_record(&record(kept.id)).await.unwrap();

    assert!(storage.delete_webhook(doomed.id).await.unwrap());
    assert!(!storage.delete_webhook(doomed.id).await.unwrap());

    assert_eq!(storage.record_count().await, 1);
    assert!(storage.find_webhook_by_id(doomed.id).await.unwrap().is_none());
    assert_eq!(
        storage.list_request_records(kept.id, 10).await.unwrap().len(),
        1
    );
}

// ============================================================================
// Ledger Record Tests
// ============================================================================

#[tokio::test]
async fn test_update_applies_outcome_once() {
    let storage = InMemoryStorage::new();
    let rec = record(WebhookId::new());
    storage.create_request_record(&rec).await.unwrap();

    let first = outcome();
    let second = DeliveryOutcome::from_attempt(
        "https://d2.test",
        AttemptResult::Responded {
            status_code: 500,
            body: "second".to_string(),
            elapsed_ms: 9,
        },
    );

    storage.update_request_record(rec.id, &first).await.unwrap();
    let again = storage.update_request_record(rec.id, &second).await;

    assert!(matches!(again, Err(StorageError::AlreadyCompleted { id }) if id == rec.id));
    let stored = storage.find_request_record_by_id(rec.id).await.unwrap().unwrap();
    assert_eq!(stored.outcome, Some(first));
}

#[tokio::test]
async fn test_update_of_missing_record_is_not_found() {
    let storage = InMemoryStorage::new();
    let result = storage.update_request_record(RequestId::new(), &outcome()).await;
    assert!(matches!(result, Err(StorageError::NotFound { .. })));
}

#[tokio::test]
async fn test_duplicate_record_is_a_conflict() {
    let storage = InMemoryStorage::new();
    let rec = record(WebhookId::new());
    storage.create_request_record(&rec).await.unwrap();

    let result = storage.create_request_record(&rec).await;

    assert!(matches!(result, Err(StorageError::Conflict { .. })));
}

#[tokio::test]
async fn test_list_is_newest_first_and_limited() {
    let storage = InMemoryStorage::new();
    let webhook_id = WebhookId::new();
    let mut ids = Vec::new();
    for _ in 0..3 {
        let rec = record(webhook_id);
        ids.push(rec.id);
        storage.create_request_record(&rec).await.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    storage
        .create_request_record(&record(WebhookId::new()))
        .await
        .unwrap();

    let listed: Vec<RequestId> = storage
        .list_request_records(webhook_id, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();

    assert_eq!(listed, vec![ids[2], ids[1]]);
}
