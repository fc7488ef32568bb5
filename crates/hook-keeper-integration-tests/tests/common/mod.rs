//! Common test utilities for hook-keeper integration tests
//!
//! This module provides:
//! - A scripted mock of `DeliveryAttempter` that records every outbound call
//! - A router harness over any `Storage` backend
//! - Request and response helpers

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use hook_keeper_api::{create_router, AppState, ServiceConfig, ServiceMetrics};
use hook_keeper_core::{
    AttemptResult, DeliveryAttempter, EndpointToken, OutboundRequest, RequestRecord, Storage,
    Webhook,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Base URL the test service believes it is reachable under
#[allow(dead_code)]
pub const SELF_BASE_URL: &str = "https://relay.example.com";

// ============================================================================
// Mock Delivery Attempter
// ============================================================================

/// Attempter answering from a per-URL script
///
/// URLs without a scripted answer fail with a connection error.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct MockAttempter {
    responses: Arc<Mutex<HashMap<String, AttemptResult>>>,
    calls: Arc<Mutex<Vec<OutboundRequest>>>,
}

#[allow(dead_code)]
impl MockAttempter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status_code: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            AttemptResult::Responded {
                status_code,
                body: body.to_string(),
                elapsed_ms: 20,
            },
        );
    }

    pub fn fail(&self, url: &str, error: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            AttemptResult::Failed {
                error: error.to_string(),
                elapsed_ms: 5,
            },
        );
    }

    pub fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

#[async_trait::async_trait]
impl DeliveryAttempter for MockAttempter {
    async fn attempt(&self, request: &OutboundRequest) -> AttemptResult {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or(AttemptResult::Failed {
                error: "connection refused".to_string(),
                elapsed_ms: 1,
            })
    }
}

// ============================================================================
// Test Harness
// ============================================================================

/// Router plus the collaborators the tests inspect
#[allow(dead_code)]
pub struct TestService {
    pub router: Router,
    pub storage: Arc<dyn Storage>,
}

#[allow(dead_code)]
impl TestService {
    /// Build the router over `storage` with `attempter` doing the deliveries
    pub fn new(storage: Arc<dyn Storage>, attempter: Arc<dyn DeliveryAttempter>) -> Self {
        let mut config = ServiceConfig::default();
        config.delivery.self_base_urls = vec![SELF_BASE_URL.to_string()];
        Self::with_config(config, storage, attempter)
    }

    pub fn with_config(
        config: ServiceConfig,
        storage: Arc<dyn Storage>,
        attempter: Arc<dyn DeliveryAttempter>,
    ) -> Self {
        let metrics = ServiceMetrics::new().expect("metrics registry");
        let state = AppState::new(config, storage.clone(), attempter, metrics)
            .expect("valid test configuration");
        Self {
            router: create_router(state),
            storage,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// POST `body` to the ingestion endpoint of `endpoint`
    pub async fn ingest(&self, endpoint: &str, body: &str) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/w/{}", endpoint))
            .header("host", "relay.example.com")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// POST a resend request for `webhook`
    pub async fn resend(&self, webhook: &Webhook, body: Value) -> Response {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/api/webhooks/{}/resend", webhook.id))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Ledger records of `webhook`, newest first
    pub async fn records(&self, webhook: &Webhook) -> Vec<RequestRecord> {
        self.storage
            .list_request_records(webhook.id, 100)
            .await
            .unwrap()
    }

    pub async fn add_webhook(&self, webhook: &Webhook) {
        self.storage.save_webhook(webhook).await.unwrap();
    }
}

// ============================================================================
// Fixtures and Helpers
// ============================================================================

#[allow(dead_code)]
pub fn webhook(endpoint: &str, destinations: &[&str]) -> Webhook {
    Webhook::new(
        endpoint,
        EndpointToken::new(endpoint).unwrap(),
        destinations.iter().map(|d| d.to_string()).collect(),
    )
}

#[allow(dead_code)]
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}
