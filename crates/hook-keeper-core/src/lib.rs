//! # Hook-Keeper Core
//!
//! Core business logic for the Hook-Keeper webhook relay.
//!
//! This crate captures inbound webhook requests, persists them to a request
//! ledger, forwards them to an ordered list of destinations with failover,
//! and replays historical requests on demand.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions ([`Storage`], [`DeliveryAttempter`])
//! - Infrastructure implementations are injected at runtime
//! - Header sanitization and destination resolution are pure functions
//!
//! ## Usage
//!
//! ```rust
//! use hook_keeper_core::{EndpointToken, RequestId, WebhookId};
//!
//! let webhook_id = WebhookId::new();
//! let request_id = RequestId::new();
//! let endpoint = EndpointToken::generate();
//! assert_eq!(endpoint.as_str().len(), 13);
//! # let _ = (webhook_id, request_id);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use ulid::Ulid;
pub use uuid::Uuid;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier of a webhook configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WebhookId(Uuid);

impl WebhookId {
    /// Generate a new random webhook ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WebhookId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WebhookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WebhookId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = s.parse::<Uuid>().map_err(|_| ParseError::InvalidFormat {
            expected: "UUID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(uuid))
    }
}

/// Unique identifier of a request ledger record
///
/// Uses ULID so records sort lexicographically by creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(Ulid);

impl RequestId {
    /// Generate a new unique request ID
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Get string representation of request ID
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ulid = s.parse::<Ulid>().map_err(|_| ParseError::InvalidFormat {
            expected: "ULID format".to_string(),
            actual: s.to_string(),
        })?;
        Ok(Self(ulid))
    }
}

/// Public-facing token that appears in the ingestion URL `/api/w/{endpoint}`
///
/// Tokens are URL path segments, so only lowercase ASCII alphanumerics,
/// hyphens and underscores are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EndpointToken(String);

impl EndpointToken {
    const MAX_LENGTH: usize = 64;
    const GENERATED_LENGTH: usize = 13;

    /// Create an endpoint token with validation
    ///
    /// # Validation Rules
    /// - Must be 1-64 characters
    /// - Must contain only lowercase alphanumerics, hyphens and underscores
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "endpoint".to_string(),
            });
        }

        if value.len() > Self::MAX_LENGTH {
            return Err(ValidationError::TooLong {
                field: "endpoint".to_string(),
                max_length: Self::MAX_LENGTH,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ValidationError::InvalidCharacters {
                field: "endpoint".to_string(),
                invalid_chars: "only lowercase alphanumerics, '-' and '_' are allowed".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Generate a random 13-character token
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(simple[..Self::GENERATED_LENGTH].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EndpointToken {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EndpointToken {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EndpointToken> for String {
    fn from(token: EndpointToken) -> Self {
        token.0
    }
}

// ============================================================================
// Time
// ============================================================================

/// UTC timestamp wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ParseError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ParseError::InvalidFormat {
                expected: "RFC3339 timestamp".to_string(),
                actual: s.to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error type for input validation failures
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Error type for string parsing failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid format: expected {expected}, got '{actual}'")]
    InvalidFormat { expected: String, actual: String },
}

// ============================================================================
// Module declarations
// ============================================================================

/// Webhook configuration model and method allowlist
pub mod webhook;

/// Destination resolution from stored representations
pub mod destinations;

/// Header sanitization for forwarded requests
pub mod headers;

/// Protection against forwarding into our own ingestion endpoint
pub mod loop_guard;

/// Single HTTP delivery attempts
pub mod delivery;

/// Ordered failover across destinations
pub mod forwarder;

/// Storage collaborator interface
pub mod storage;

/// Request ledger persistence
pub mod ledger;

/// Webhook lookup by public endpoint
pub mod lookup;

/// Ingestion pipeline
pub mod ingest;

/// Manual replay of historical requests
pub mod resend;

/// Storage adapters
pub mod adapters;

// Re-export key types for convenience
pub use adapters::{FilesystemStorage, InMemoryStorage};
pub use delivery::{AttemptResult, DeliveryAttempter, HttpDeliveryAttempter, OutboundRequest};
pub use destinations::{resolve_destinations, DestinationSource};
pub use forwarder::{DeliveryOutcome, FailoverForwarder};
pub use headers::{sanitize_headers, HeaderSet, Provenance};
pub use ingest::{InboundRequest, IngestError, IngestReceipt, WebhookIngestor};
pub use ledger::{CapturedRequest, LedgerError, QueryParams, RequestLedger, RequestRecord};
pub use lookup::WebhookLookup;
pub use loop_guard::LoopGuard;
pub use resend::{
    ResendError, ResendOrchestrator, ResendReport, ResendResult, ResendSummary, ResendTarget,
};
pub use storage::{Storage, StorageError};
pub use webhook::Webhook;

#[cfg(test)]
mod test_support;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
