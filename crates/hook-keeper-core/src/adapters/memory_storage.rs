//! # In-Memory Storage
//!
//! Thread-safe in-memory implementation for tests, development, and
//! single-instance deployments that do not need history across restarts.

use crate::forwarder::DeliveryOutcome;
use crate::ledger::RequestRecord;
use crate::storage::{Storage, StorageError};
use crate::webhook::Webhook;
use crate::{EndpointToken, RequestId, WebhookId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    webhooks: HashMap<WebhookId, Webhook>,
    /// Ledger records keyed by ULID, so iteration is in creation order
    records: BTreeMap<RequestId, RequestRecord>,
}

/// In-memory storage backend
///
/// Clones share the same underlying state.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<RwLock<State>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger records across all webhooks
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn find_webhook_by_endpoint(
        &self,
        endpoint: &EndpointToken,
    ) -> Result<Option<Webhook>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .webhooks
            .values()
            .find(|webhook| &webhook.endpoint == endpoint)
            .cloned())
    }

    async fn find_webhook_by_id(&self, id: WebhookId) -> Result<Option<Webhook>, StorageError> {
        Ok(self.state.read().await.webhooks.get(&id).cloned())
    }

    async fn save_webhook(&self, webhook: &Webhook) -> Result<(), StorageError> {
        let mut state = self.state.write().await;

        let taken = state
            .webhooks
            .values()
            .any(|other| other.endpoint == webhook.endpoint && other.id != webhook.id);
        if taken {
            return Err(StorageError::Conflict {
                message: format!("endpoint '{}' is already in use", webhook.endpoint),
            });
        }

        state.webhooks.insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn delete_webhook(&self, id: WebhookId) -> Result<bool, StorageError> {
        let mut state = self.state.write().await;
        if state.webhooks.remove(&id).is_none() {
            return Ok(false);
        }
        state.records.retain(|_, record| record.webhook_id != id);
        Ok(true)
    }

    async fn create_request_record(&self, record: &RequestRecord) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        if state.records.contains_key(&record.id) {
            return Err(StorageError::Conflict {
                message: format!("request record {} already exists", record.id),
            });
        }
        state.records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_request_record(
        &self,
        id: RequestId,
        outcome: &DeliveryOutcome,
    ) -> Result<(), StorageError> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound { id: id.to_string() })?;

        if record.is_completed() {
            return Err(StorageError::AlreadyCompleted { id });
        }
        record.outcome = Some(outcome.clone());
        Ok(())
    }

    async fn find_request_record_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<RequestRecord>, StorageError> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn list_request_records(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<RequestRecord>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .records
            .values()
            .rev()
            .filter(|record| record.webhook_id == webhook_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_storage_tests.rs"]
mod tests;
