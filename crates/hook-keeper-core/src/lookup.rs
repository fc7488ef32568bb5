//! # Webhook Lookup
//!
//! Resolves a public endpoint token to an active webhook. Inactive webhooks
//! are reported exactly like missing ones so callers of the public endpoint
//! cannot probe for disabled configurations.

use crate::storage::{Storage, StorageError};
use crate::webhook::Webhook;
use crate::EndpointToken;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct WebhookLookup {
    storage: Arc<dyn Storage>,
}

impl WebhookLookup {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Find the active webhook behind `endpoint`
    ///
    /// Returns `Ok(None)` when the webhook is missing or inactive.
    pub async fn find_active(&self, endpoint: &EndpointToken) -> Result<Option<Webhook>, StorageError> {
        match self.storage.find_webhook_by_endpoint(endpoint).await? {
            Some(webhook) if webhook.is_active => Ok(Some(webhook)),
            Some(webhook) => {
                debug!(webhook_id = %webhook.id, "Webhook is inactive");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Parse a raw path segment and look it up
    ///
    /// Segments that are not valid endpoint tokens cannot belong to any
    /// webhook and are reported as not found.
    pub async fn find_active_by_segment(&self, segment: &str) -> Result<Option<Webhook>, StorageError> {
        match EndpointToken::new(segment) {
            Ok(endpoint) => self.find_active(&endpoint).await,
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "lookup_tests.rs"]
mod tests;
