//! Error types for the HTTP service

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use hook_keeper_core::{IngestError, ResendError};
use serde_json::{json, Map, Value};
use tracing::{error, warn};

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Ingestion endpoint errors with HTTP status code mapping
///
/// - `404 Not Found`: webhook missing or inactive, with no distinguishing detail
/// - `405 Method Not Allowed`: method rejected, body lists the allowed methods
/// - `502 Bad Gateway`: no destination produced a response
/// - `504 Gateway Timeout`: the request deadline passed; delivery continues
/// - `500 Internal Server Error`: ledger or storage failure
///
/// Internal failures are logged server-side; clients only get a generic
/// message.
#[derive(Debug, thiserror::Error)]
pub enum IngestHandlerError {
    #[error("Webhook not found or inactive")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed { allowed: Vec<String> },

    #[error("Failed to forward webhook")]
    DeliveryFailed { details: String },

    #[error("Webhook processing timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl From<IngestError> for IngestHandlerError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::NotFound => Self::NotFound,
            IngestError::MethodNotAllowed { allowed } => Self::MethodNotAllowed { allowed },
            IngestError::Lookup(e) => Self::Internal {
                message: e.to_string(),
            },
            IngestError::Ledger(e) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for IngestHandlerError {
    fn into_response(self) -> Response {
        let mut extra = Map::new();
        let mut allow_header = None;

        let (status, message) = match &self {
            Self::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::MethodNotAllowed { allowed } => {
                allow_header = Some(allowed.join(", "));
                extra.insert("allowedMethods".to_string(), json!(allowed));
                (StatusCode::METHOD_NOT_ALLOWED, self.to_string())
            }
            Self::DeliveryFailed { details } => {
                extra.insert("details".to_string(), json!(details));
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            Self::Timeout { seconds } => {
                warn!(timeout_seconds = seconds, "Ingestion deadline exceeded");
                (StatusCode::GATEWAY_TIMEOUT, self.to_string())
            }
            Self::Internal { message } => {
                error!(error = %message, "Ingestion failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    INTERNAL_ERROR_MESSAGE.to_string(),
                )
            }
        };

        let mut response = error_response(status, message, extra);
        if let Some(allow) = allow_header.and_then(|a| HeaderValue::from_str(&a).ok()) {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}

/// Resend endpoint errors
#[derive(Debug, thiserror::Error)]
pub enum ResendHandlerError {
    #[error("{message}")]
    BadRequest { message: String },

    #[error("Webhook not found")]
    WebhookNotFound,

    #[error("Request not found")]
    RequestNotFound,

    #[error("Failed to resend webhook: {message}")]
    Internal { message: String },
}

impl From<ResendError> for ResendHandlerError {
    fn from(error: ResendError) -> Self {
        match error {
            ResendError::WebhookNotFound { .. } => Self::WebhookNotFound,
            ResendError::RecordNotFound { .. } => Self::RequestNotFound,
            ResendError::Storage(e) => Self::Internal {
                message: e.to_string(),
            },
            ResendError::Ledger(e) => Self::Internal {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for ResendHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest { message } => (StatusCode::BAD_REQUEST, message.clone()),
            Self::WebhookNotFound | Self::RequestNotFound => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            Self::Internal { message } => {
                error!(error = %message, "Resend failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to resend webhook".to_string(),
                )
            }
        };

        error_response(status, message, Map::new())
    }
}

/// JSON error body shared by all handlers
fn error_response(status: StatusCode, message: String, extra: Map<String, Value>) -> Response {
    let mut body = Map::new();
    body.insert("error".to_string(), json!(message));
    body.insert("status".to_string(), json!(status.as_u16()));
    body.insert(
        "timestamp".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    body.extend(extra);

    (status, Json(Value::Object(body))).into_response()
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Health check failed: {message}")]
    HealthCheckFailed { message: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
