//! # Storage Interface
//!
//! Persistence collaborator for webhook configuration and the request
//! ledger. Implementations provide single-record atomicity per call; the
//! core never needs cross-record transactions.
//!
//! See [`crate::adapters`] for the in-memory and filesystem implementations.

use crate::forwarder::DeliveryOutcome;
use crate::ledger::RequestRecord;
use crate::webhook::Webhook;
use crate::{EndpointToken, RequestId, WebhookId};
use async_trait::async_trait;

/// Errors raised by a storage backend
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Request record {id} has already been completed")]
    AlreadyCompleted { id: RequestId },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    #[error("Storage unavailable: {message}")]
    Unavailable { message: String },

    #[error("Storage operation failed: {message}")]
    OperationFailed { message: String },
}

impl StorageError {
    /// Check if the error is transient and the call could be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Persistence for webhooks and ledger records
#[async_trait]
pub trait Storage: Send + Sync {
    /// Look up a webhook by its public endpoint token
    async fn find_webhook_by_endpoint(
        &self,
        endpoint: &EndpointToken,
    ) -> Result<Option<Webhook>, StorageError>;

    /// Look up a webhook by ID
    async fn find_webhook_by_id(&self, id: WebhookId) -> Result<Option<Webhook>, StorageError>;

    /// Insert or replace a webhook
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if another webhook already uses the
    /// same endpoint token.
    async fn save_webhook(&self, webhook: &Webhook) -> Result<(), StorageError>;

    /// Delete a webhook together with all of its ledger records
    ///
    /// Returns `false` if the webhook did not exist.
    async fn delete_webhook(&self, id: WebhookId) -> Result<bool, StorageError>;

    /// Persist a new, not yet completed, ledger record
    async fn create_request_record(&self, record: &RequestRecord) -> Result<(), StorageError>;

    /// Apply the completion fields of a ledger record
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist and
    /// `StorageError::AlreadyCompleted` if it was completed before.
    async fn update_request_record(
        &self,
        id: RequestId,
        outcome: &DeliveryOutcome,
    ) -> Result<(), StorageError>;

    /// Look up a ledger record by ID
    async fn find_request_record_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<RequestRecord>, StorageError>;

    /// Most recent ledger records of a webhook, newest first
    async fn list_request_records(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<RequestRecord>, StorageError>;

    /// Check the backend is reachable
    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
