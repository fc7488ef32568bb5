//! # Ingestion Pipeline
//!
//! Handles one inbound request end to end:
//!
//! 1. Look up the active webhook behind the endpoint token
//! 2. Check the method allowlist
//! 3. Create the ledger record
//! 4. Resolve destinations and sanitize headers
//! 5. Forward with failover
//! 6. Complete the ledger record
//!
//! Steps 1 and 2 reject the request without writing to the ledger.

use crate::forwarder::{DeliveryOutcome, FailoverForwarder};
use crate::headers::{sanitize_headers, HeaderSet, Provenance};
use crate::ledger::{CapturedRequest, LedgerError, QueryParams, RequestLedger};
use crate::lookup::WebhookLookup;
use crate::storage::{Storage, StorageError};
use crate::{RequestId, WebhookId};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Inbound request as received on the public endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    pub headers: HeaderSet,
    pub body: String,
    pub query: QueryParams,
}

impl InboundRequest {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    fn captured(&self) -> CapturedRequest {
        CapturedRequest {
            method: self.method.to_ascii_uppercase(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            query: self.query.clone(),
        }
    }
}

/// Result of a completed ingestion
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub request_id: RequestId,
    pub webhook_id: WebhookId,
    pub outcome: DeliveryOutcome,
}

/// Reasons an inbound request is not forwarded
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Webhook missing or inactive
    #[error("Webhook not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed { allowed: Vec<String> },

    #[error("Webhook lookup failed: {0}")]
    Lookup(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The ingestion pipeline
#[derive(Clone)]
pub struct WebhookIngestor {
    lookup: WebhookLookup,
    ledger: RequestLedger,
    forwarder: FailoverForwarder,
}

impl WebhookIngestor {
    pub fn new(storage: Arc<dyn Storage>, forwarder: FailoverForwarder) -> Self {
        Self {
            lookup: WebhookLookup::new(storage.clone()),
            ledger: RequestLedger::new(storage),
            forwarder,
        }
    }

    /// Process an inbound request received on `/api/w/{endpoint}`
    #[instrument(skip(self, request), fields(method = %request.method, body_len = request.body.len()))]
    pub async fn ingest(
        &self,
        endpoint: &str,
        request: InboundRequest,
    ) -> Result<IngestReceipt, IngestError> {
        let webhook = self
            .lookup
            .find_active_by_segment(endpoint)
            .await?
            .ok_or(IngestError::NotFound)?;

        if !webhook.allows_method(&request.method) {
            warn!(webhook_id = %webhook.id, "Method rejected by allowlist");
            return Err(IngestError::MethodNotAllowed {
                allowed: webhook.allowed_methods_upper(),
            });
        }

        let captured = request.captured();
        let request_id = self.ledger.create(webhook.id, captured.clone()).await?;

        let destinations = webhook.destination_list();
        let outcome = if destinations.is_empty() {
            warn!(webhook_id = %webhook.id, request_id = %request_id, "Webhook has no destinations");
            DeliveryOutcome::no_destinations()
        } else {
            let headers = sanitize_headers(
                &captured.headers,
                Provenance::Ingest,
                &webhook.custom_headers,
            );
            self.forwarder
                .forward(
                    &destinations,
                    &captured.method,
                    &headers,
                    &captured.body,
                    webhook.timeout(),
                )
                .await
        };

        self.ledger.complete(request_id, &outcome).await?;

        info!(
            webhook_id = %webhook.id,
            request_id = %request_id,
            status_code = ?outcome.status_code,
            delivered = outcome.is_delivered(),
            "Webhook request processed"
        );

        Ok(IngestReceipt {
            request_id,
            webhook_id: webhook.id,
            outcome,
        })
    }
}

#[cfg(test)]
#[path = "ingest_tests.rs"]
mod tests;
