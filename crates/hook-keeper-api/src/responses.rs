//! Request bodies, query parameters, and response types for the API.
//!
//! Wire names are camelCase.

use hook_keeper_core::{
    ledger::QueryParams, HeaderSet, RequestId, RequestRecord, ResendReport, ResendResult,
    ResendSummary, Timestamp, WebhookId,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request Types
// ============================================================================

/// Body of `POST /api/webhooks/{id}/resend`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendRequestBody {
    pub request_id: Option<String>,
    pub destination_urls: Option<Vec<String>>,
    #[serde(default)]
    pub resend_all: bool,
}

/// Query parameters of `GET /api/webhooks/{id}/requests`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestListParams {
    pub limit: Option<usize>,
}

// ============================================================================
// Response Types
// ============================================================================

/// Resend response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<ResendResultResponse>,
    pub summary: ResendSummary,
}

impl From<ResendReport> for ResendResponse {
    fn from(report: ResendReport) -> Self {
        Self {
            success: report.any_success(),
            message: report.message(),
            results: report.results.into_iter().map(Into::into).collect(),
            summary: report.summary,
        }
    }
}

/// One destination's resend result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendResultResponse {
    pub destination_url: String,
    pub status_code: Option<u16>,
    pub response_time: Option<u64>,
    pub error: Option<String>,
    pub success: bool,
    pub request_id: RequestId,
}

impl From<ResendResult> for ResendResultResponse {
    fn from(result: ResendResult) -> Self {
        Self {
            destination_url: result.destination_url,
            status_code: result.status_code,
            response_time: result.response_time_ms,
            error: result.error,
            success: result.success,
            request_id: result.request_id,
        }
    }
}

/// Ledger listing for one webhook
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListResponse {
    pub webhook_id: WebhookId,
    pub requests: Vec<RequestSummary>,
    pub total: usize,
}

/// One ledger record as exposed over HTTP
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: RequestId,
    pub method: String,
    pub headers: HeaderSet,
    pub body: String,
    pub query: QueryParams,
    pub received_at: Timestamp,
    pub resend_of: Option<RequestId>,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
    pub response_time: Option<u64>,
    pub error: Option<String>,
    pub destination_url: Option<String>,
    pub forwarded_at: Option<Timestamp>,
}

impl From<RequestRecord> for RequestSummary {
    fn from(record: RequestRecord) -> Self {
        let outcome = record.outcome.unwrap_or_default();

        Self {
            id: record.id,
            method: record.method,
            headers: record.headers,
            body: record.body,
            query: record.query,
            received_at: record.received_at,
            resend_of: record.resend_of,
            status_code: outcome.status_code,
            response_body: outcome.response_body,
            response_time: outcome.response_time_ms,
            error: outcome.error,
            destination_url: outcome.destination_url,
            forwarded_at: outcome.forwarded_at,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub timestamp: Timestamp,
}

/// Echo destination response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationEchoResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
    pub method: String,
    pub received_data: ReceivedData,
}

/// Sizes of what the echo destination received
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivedData {
    /// Number of headers
    pub headers: usize,
    /// Body length in bytes
    pub body_size: usize,
    /// Number of query parameters
    pub query_params: usize,
}

/// Generated echo destination URL
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedDestinationResponse {
    pub destination_url: String,
    pub random_path: String,
    pub base_url: String,
    pub is_public: bool,
}
