//! # Failover Forwarder
//!
//! Walks a webhook's destinations in order and stops at the first one that
//! produces any HTTP response. A destination that answers, even with a 5xx,
//! has handled the request; only transport failures and loop-guard refusals
//! move on to the next destination.

use crate::delivery::{AttemptResult, DeliveryAttempter, OutboundRequest};
use crate::headers::HeaderSet;
use crate::loop_guard::{LoopGuard, SELF_REFERENCE_ERROR};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Error recorded when a webhook has nowhere to forward to
pub const NO_DESTINATIONS_ERROR: &str = "No destination URLs configured";

/// Status code recorded alongside [`NO_DESTINATIONS_ERROR`]
pub const NO_DESTINATIONS_STATUS: u16 = 500;

/// Recorded outcome of a forward or resend
///
/// Exactly one destination's result, or an error when none produced a
/// response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryOutcome {
    /// `None` when no response was received
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub response_time_ms: Option<u64>,
    pub error: Option<String>,
    /// Destination whose result this is
    pub destination_url: Option<String>,
    /// Set once an HTTP attempt has been made
    pub forwarded_at: Option<Timestamp>,
}

impl DeliveryOutcome {
    /// Outcome for a webhook without destinations; no attempt is made
    pub fn no_destinations() -> Self {
        Self {
            status_code: Some(NO_DESTINATIONS_STATUS),
            response_body: None,
            response_time_ms: None,
            error: Some(NO_DESTINATIONS_ERROR.to_string()),
            destination_url: None,
            forwarded_at: None,
        }
    }

    /// Outcome for a destination refused by the loop guard
    pub fn refused(destination: &str) -> Self {
        Self {
            status_code: None,
            response_body: None,
            response_time_ms: None,
            error: Some(SELF_REFERENCE_ERROR.to_string()),
            destination_url: Some(destination.to_string()),
            forwarded_at: None,
        }
    }

    /// Outcome of an HTTP attempt against `destination`
    pub fn from_attempt(destination: &str, attempt: AttemptResult) -> Self {
        let forwarded_at = Some(Timestamp::now());
        match attempt {
            AttemptResult::Responded {
                status_code,
                body,
                elapsed_ms,
            } => Self {
                status_code: Some(status_code),
                response_body: Some(body),
                response_time_ms: Some(elapsed_ms),
                error: None,
                destination_url: Some(destination.to_string()),
                forwarded_at,
            },
            AttemptResult::Failed { error, elapsed_ms } => Self {
                status_code: None,
                response_body: None,
                response_time_ms: Some(elapsed_ms),
                error: Some(error),
                destination_url: Some(destination.to_string()),
                forwarded_at,
            },
        }
    }

    /// A destination produced a response
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }

    /// Delivered with a status below 400
    pub fn is_success(&self) -> bool {
        self.is_delivered() && self.status_code.is_some_and(|code| code < 400)
    }
}

/// Sequential failover across an ordered destination list
#[derive(Clone)]
pub struct FailoverForwarder {
    attempter: Arc<dyn DeliveryAttempter>,
    loop_guard: Arc<LoopGuard>,
}

impl FailoverForwarder {
    pub fn new(attempter: Arc<dyn DeliveryAttempter>, loop_guard: Arc<LoopGuard>) -> Self {
        Self {
            attempter,
            loop_guard,
        }
    }

    /// Forward to `destinations` in order, stopping at the first response
    #[instrument(skip(self, headers, body), fields(destination_count = destinations.len()))]
    pub async fn forward(
        &self,
        destinations: &[String],
        method: &str,
        headers: &HeaderSet,
        body: &str,
        timeout: Duration,
    ) -> DeliveryOutcome {
        let mut last_failure = DeliveryOutcome::no_destinations();
        let mut first_forwarded_at = None;

        for (index, destination) in destinations.iter().enumerate() {
            let outcome = self
                .deliver_once(destination, method, headers, body, timeout)
                .await;

            if outcome.is_delivered() {
                info!(
                    destination = %destination,
                    position = index,
                    status_code = ?outcome.status_code,
                    "Destination accepted forwarded request"
                );
                return outcome;
            }

            first_forwarded_at = first_forwarded_at.or(outcome.forwarded_at);
            let remaining = destinations.len() - index - 1;
            warn!(
                destination = %destination,
                error = ?outcome.error,
                remaining,
                "Destination failed"
            );
            last_failure = outcome;
        }

        // A trailing loop refusal must not hide earlier HTTP attempts
        last_failure.forwarded_at = last_failure.forwarded_at.or(first_forwarded_at);
        last_failure
    }

    /// Deliver to exactly one destination, with no failover
    pub async fn deliver_once(
        &self,
        destination: &str,
        method: &str,
        headers: &HeaderSet,
        body: &str,
        timeout: Duration,
    ) -> DeliveryOutcome {
        if self.loop_guard.is_self_reference(destination) {
            warn!(destination = %destination, "Refusing to forward into own ingestion endpoint");
            return DeliveryOutcome::refused(destination);
        }

        let request = OutboundRequest {
            url: destination.to_string(),
            method: method.to_string(),
            headers: headers.clone(),
            body: body.to_string(),
            timeout,
        };

        let attempt = self.attempter.attempt(&request).await;
        DeliveryOutcome::from_attempt(destination, attempt)
    }
}

#[cfg(test)]
#[path = "forwarder_tests.rs"]
mod tests;
