//! Tests for HTTP error mapping.

use super::*;
use hook_keeper_core::{RequestId, StorageError, WebhookId};

async fn into_parts(response: Response) -> (StatusCode, axum::http::HeaderMap, Value) {
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_not_found_does_not_reveal_reason() {
    let (status, _, body) = into_parts(IngestHandlerError::NotFound.into_response()).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Webhook not found or inactive");
    assert_eq!(body["status"], 404);
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_method_not_allowed_lists_methods() {
    let error = IngestHandlerError::MethodNotAllowed {
        allowed: vec!["POST".to_string(), "PUT".to_string()],
    };

    let (status, headers, body) = into_parts(error.into_response()).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get(header::ALLOW).unwrap(), "POST, PUT");
    assert_eq!(body["allowedMethods"], json!(["POST", "PUT"]));
}

#[tokio::test]
async fn test_delivery_failure_carries_details() {
    let error = IngestHandlerError::DeliveryFailed {
        details: "connection refused".to_string(),
    };

    let (status, _, body) = into_parts(error.into_response()).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "Failed to forward webhook");
    assert_eq!(body["details"], "connection refused");
}

#[tokio::test]
async fn test_timeout_maps_to_gateway_timeout() {
    let (status, _, _) =
        into_parts(IngestHandlerError::Timeout { seconds: 60 }.into_response()).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_internal_error_hides_message() {
    let error = IngestHandlerError::from(IngestError::Lookup(StorageError::Unavailable {
        message: "disk on fire at /secret/path".to_string(),
    }));

    let (status, _, body) = into_parts(error.into_response()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Internal server error");
    assert!(!body.to_string().contains("/secret/path"));
}

#[tokio::test]
async fn test_resend_errors_map_to_status_codes() {
    let not_found = ResendHandlerError::from(ResendError::WebhookNotFound {
        webhook_id: WebhookId::new(),
    });
    let missing_record = ResendHandlerError::from(ResendError::RecordNotFound {
        request_id: RequestId::new(),
    });
    let storage = ResendHandlerError::from(ResendError::Storage(StorageError::OperationFailed {
        message: "boom".to_string(),
    }));
    let bad_request = ResendHandlerError::BadRequest {
        message: "requestId is required".to_string(),
    };

    let (status, _, body) = into_parts(not_found.into_response()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Webhook not found");

    let (status, _, body) = into_parts(missing_record.into_response()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Request not found");

    let (status, _, body) = into_parts(storage.into_response()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to resend webhook");

    let (status, _, body) = into_parts(bad_request.into_response()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "requestId is required");
}
