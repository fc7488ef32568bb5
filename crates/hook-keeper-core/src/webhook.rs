//! # Webhook Configuration
//!
//! A webhook is a forwarding rule: a public ingestion endpoint plus the
//! destinations inbound requests are relayed to. This crate only reads
//! webhook configuration; creating and editing webhooks belongs to the
//! management surface.

use crate::destinations::{resolve_destinations, DestinationSource};
use crate::headers::HeaderSet;
use crate::{EndpointToken, Timestamp, WebhookId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-attempt timeout applied when a webhook does not configure one
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT_SECONDS
}

fn default_active() -> bool {
    true
}

/// Forwarding configuration for one public endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Webhook {
    pub id: WebhookId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Token used in the ingestion URL path
    pub endpoint: EndpointToken,

    /// Ordered destinations in whatever representation was stored
    #[serde(default)]
    pub destinations: Option<DestinationSource>,

    /// Legacy single destination
    #[serde(default)]
    pub destination_url: Option<String>,

    /// Accepted HTTP methods; empty accepts everything
    #[serde(default)]
    pub allowed_methods: Vec<String>,

    /// Headers merged into every forwarded request
    #[serde(default)]
    pub custom_headers: HeaderSet,

    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    #[serde(default = "default_active")]
    pub is_active: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Webhook {
    /// Create an active webhook forwarding to `destinations` in order
    pub fn new(name: impl Into<String>, endpoint: EndpointToken, destinations: Vec<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: WebhookId::new(),
            name: name.into(),
            endpoint,
            destinations: Some(DestinationSource::from_urls(destinations)),
            destination_url: None,
            allowed_methods: Vec::new(),
            custom_headers: HeaderSet::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_allowed_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }

    /// Canonical ordered destination list
    pub fn destination_list(&self) -> Vec<String> {
        resolve_destinations(self.destinations.as_ref(), self.destination_url.as_deref())
    }

    /// Check the inbound method against the allowlist
    ///
    /// Comparison is case-insensitive. An empty allowlist accepts all methods.
    pub fn allows_method(&self, method: &str) -> bool {
        if self.allowed_methods.is_empty() {
            return true;
        }
        let method = method.to_ascii_uppercase();
        self.allowed_methods
            .iter()
            .any(|allowed| allowed.trim().to_ascii_uppercase() == method)
    }

    /// Allowed methods, uppercased, for error reporting
    pub fn allowed_methods_upper(&self) -> Vec<String> {
        self.allowed_methods
            .iter()
            .map(|m| m.trim().to_ascii_uppercase())
            .collect()
    }

    /// Per-attempt timeout; zero falls back to the default
    pub fn timeout(&self) -> Duration {
        match self.timeout_seconds {
            0 => Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            seconds => Duration::from_secs(seconds),
        }
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
