//! # Resend Orchestrator
//!
//! Replays a historical ledger record to one or more destinations. Unlike
//! ingestion there is no failover: every target gets exactly one attempt and
//! its own new ledger record. The original record is never modified.
//!
//! Targets are independent, so attempts run concurrently up to a configured
//! limit. Results are reported in target order.

use crate::forwarder::{DeliveryOutcome, FailoverForwarder};
use crate::headers::{sanitize_headers, Provenance};
use crate::ledger::{LedgerError, RequestLedger, RequestRecord};
use crate::storage::{Storage, StorageError};
use crate::webhook::Webhook;
use crate::{RequestId, WebhookId};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Concurrent attempts used when none is configured
pub const DEFAULT_RESEND_CONCURRENCY: usize = 4;

/// Which destinations a resend goes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendTarget {
    /// The webhook's current destination list
    All,

    /// Caller-supplied destinations
    Urls(Vec<String>),
}

/// Outcome of one resend attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendResult {
    pub destination_url: String,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    /// No transport error and a status below 400
    pub success: bool,
    /// Ledger record created for this attempt
    pub request_id: RequestId,
}

/// Aggregate counts over all attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl ResendSummary {
    fn from_results(results: &[ResendResult]) -> Self {
        let success = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            success,
            failed: results.len() - success,
        }
    }
}

/// Full result of a resend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResendReport {
    pub original_request_id: RequestId,
    pub results: Vec<ResendResult>,
    pub summary: ResendSummary,
}

impl ResendReport {
    /// At least one destination accepted the resend
    pub fn any_success(&self) -> bool {
        self.summary.success > 0
    }

    pub fn message(&self) -> String {
        format!(
            "Resent to {}/{} destinations",
            self.summary.success, self.summary.total
        )
    }
}

/// Errors that abort a resend before or during record keeping
///
/// Failing destinations are never errors; they are reported per result.
#[derive(Debug, thiserror::Error)]
pub enum ResendError {
    #[error("Webhook not found: {webhook_id}")]
    WebhookNotFound { webhook_id: WebhookId },

    /// Missing, or owned by a different webhook
    #[error("Request not found: {request_id}")]
    RecordNotFound { request_id: RequestId },

    #[error("Resend lookup failed: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Replays ledger records to destinations
#[derive(Clone)]
pub struct ResendOrchestrator {
    storage: Arc<dyn Storage>,
    ledger: RequestLedger,
    forwarder: FailoverForwarder,
    concurrency: usize,
}

impl ResendOrchestrator {
    pub fn new(storage: Arc<dyn Storage>, forwarder: FailoverForwarder) -> Self {
        Self {
            ledger: RequestLedger::new(storage.clone()),
            storage,
            forwarder,
            concurrency: DEFAULT_RESEND_CONCURRENCY,
        }
    }

    /// Limit on concurrent attempts; zero is treated as one
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Replay `original_id` of `webhook_id` to `target`
    #[instrument(skip(self, target), fields(webhook_id = %webhook_id, original_request_id = %original_id))]
    pub async fn resend(
        &self,
        webhook_id: WebhookId,
        original_id: RequestId,
        target: ResendTarget,
    ) -> Result<ResendReport, ResendError> {
        let webhook = self
            .storage
            .find_webhook_by_id(webhook_id)
            .await?
            .ok_or(ResendError::WebhookNotFound { webhook_id })?;

        let original = self
            .ledger
            .find(original_id)
            .await?
            .filter(|record| record.webhook_id == webhook_id)
            .ok_or(ResendError::RecordNotFound {
                request_id: original_id,
            })?;

        let targets = match target {
            ResendTarget::All => webhook.destination_list(),
            ResendTarget::Urls(urls) => urls
                .into_iter()
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty())
                .collect(),
        };

        if targets.is_empty() {
            warn!("Resend has no target destinations");
        }

        let attempts: Vec<Result<ResendResult, LedgerError>> = stream::iter(targets)
            .map(|destination| self.resend_one(&webhook, &original, destination))
            .buffered(self.concurrency)
            .collect()
            .await;
        let results = attempts.into_iter().collect::<Result<Vec<_>, _>>()?;

        let summary = ResendSummary::from_results(&results);
        info!(
            total = summary.total,
            success = summary.success,
            failed = summary.failed,
            "Resend completed"
        );

        Ok(ResendReport {
            original_request_id: original_id,
            results,
            summary,
        })
    }

    async fn resend_one(
        &self,
        webhook: &Webhook,
        original: &RequestRecord,
        destination: String,
    ) -> Result<ResendResult, LedgerError> {
        let headers = sanitize_headers(
            &original.headers,
            Provenance::Resend {
                original_request_id: original.id,
            },
            &webhook.custom_headers,
        );

        let request_id = self.ledger.create_resend(original).await?;
        let outcome: DeliveryOutcome = self
            .forwarder
            .deliver_once(
                &destination,
                &original.method,
                &headers,
                &original.body,
                webhook.timeout(),
            )
            .await;
        self.ledger.complete(request_id, &outcome).await?;

        Ok(ResendResult {
            success: outcome.is_success(),
            status_code: outcome.status_code,
            response_time_ms: outcome.response_time_ms,
            error: outcome.error,
            destination_url: destination,
            request_id,
        })
    }
}

#[cfg(test)]
#[path = "resend_tests.rs"]
mod tests;
