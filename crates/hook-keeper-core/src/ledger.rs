//! # Request Ledger
//!
//! Every inbound request and every resend attempt gets one ledger record.
//! The record is created before any forwarding happens, so a crash during
//! delivery still leaves a trace, and it is completed exactly once when the
//! outcome is known. Resends always create new records; history is never
//! rewritten.

use crate::forwarder::DeliveryOutcome;
use crate::headers::{HeaderSet, HEADER_ORIGINAL_REQUEST_ID, HEADER_RESEND};
use crate::storage::{Storage, StorageError};
use crate::{RequestId, Timestamp, WebhookId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Query string parameters of a captured request
pub type QueryParams = BTreeMap<String, String>;

/// Request data captured on receipt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub method: String,
    pub headers: HeaderSet,
    pub body: String,
    pub query: QueryParams,
}

/// One ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: RequestId,
    pub webhook_id: WebhookId,
    pub method: String,
    pub headers: HeaderSet,
    pub body: String,
    #[serde(default)]
    pub query: QueryParams,
    pub received_at: Timestamp,

    /// Ledger record this one replays, for resend records
    #[serde(default)]
    pub resend_of: Option<RequestId>,

    /// Completion fields; `None` until the delivery resolves
    #[serde(default)]
    pub outcome: Option<DeliveryOutcome>,
}

impl RequestRecord {
    /// New, not yet completed, record for `webhook_id`
    pub fn new(webhook_id: WebhookId, captured: CapturedRequest) -> Self {
        Self {
            id: RequestId::new(),
            webhook_id,
            method: captured.method,
            headers: captured.headers,
            body: captured.body,
            query: captured.query,
            received_at: Timestamp::now(),
            resend_of: None,
            outcome: None,
        }
    }

    /// The replayable part of the record
    pub fn captured(&self) -> CapturedRequest {
        CapturedRequest {
            method: self.method.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            query: self.query.clone(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Errors from ledger persistence
///
/// Any ledger failure is fatal for the request being handled.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger persistence failed: {0}")]
    Storage(#[from] StorageError),
}

/// Ledger operations on top of a [`Storage`] backend
#[derive(Clone)]
pub struct RequestLedger {
    storage: Arc<dyn Storage>,
}

impl RequestLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persist an inbound request before forwarding it
    pub async fn create(
        &self,
        webhook_id: WebhookId,
        captured: CapturedRequest,
    ) -> Result<RequestId, LedgerError> {
        let record = RequestRecord::new(webhook_id, captured);
        self.insert(record).await
    }

    /// Persist a resend of `original`
    ///
    /// The stored headers are the original ones marked with the resend
    /// provenance headers.
    pub async fn create_resend(&self, original: &RequestRecord) -> Result<RequestId, LedgerError> {
        let mut captured = original.captured();
        captured
            .headers
            .insert(HEADER_RESEND.to_string(), "true".to_string());
        captured
            .headers
            .insert(HEADER_ORIGINAL_REQUEST_ID.to_string(), original.id.to_string());

        let mut record = RequestRecord::new(original.webhook_id, captured);
        record.resend_of = Some(original.id);
        self.insert(record).await
    }

    /// Record the outcome of a forward or resend
    ///
    /// Must be called once per record; a second call fails with
    /// `StorageError::AlreadyCompleted`.
    pub async fn complete(&self, id: RequestId, outcome: &DeliveryOutcome) -> Result<(), LedgerError> {
        self.storage
            .update_request_record(id, outcome)
            .await
            .map_err(|e| {
                error!(request_id = %id, error = %e, "Failed to complete ledger record");
                LedgerError::from(e)
            })?;
        debug!(request_id = %id, status_code = ?outcome.status_code, "Completed ledger record");
        Ok(())
    }

    pub async fn find(&self, id: RequestId) -> Result<Option<RequestRecord>, LedgerError> {
        Ok(self.storage.find_request_record_by_id(id).await?)
    }

    /// Most recent records of a webhook, newest first
    pub async fn recent(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<RequestRecord>, LedgerError> {
        Ok(self.storage.list_request_records(webhook_id, limit).await?)
    }

    async fn insert(&self, record: RequestRecord) -> Result<RequestId, LedgerError> {
        let id = record.id;
        self.storage.create_request_record(&record).await.map_err(|e| {
            error!(request_id = %id, error = %e, "Failed to create ledger record");
            LedgerError::from(e)
        })?;
        debug!(request_id = %id, webhook_id = %record.webhook_id, "Created ledger record");
        Ok(id)
    }
}

#[cfg(test)]
#[path = "ledger_tests.rs"]
mod tests;
