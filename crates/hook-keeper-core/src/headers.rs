//! # Header Sanitization
//!
//! Builds the header set sent to a destination from the headers captured on
//! the inbound request. Headers that describe the inbound connection are
//! dropped, provenance headers are injected, the content type is normalized
//! and the webhook's custom headers are merged last.
//!
//! The sanitizer is a pure function: the captured headers are never modified.

use crate::RequestId;
use std::collections::BTreeMap;

/// Header name to value mapping; names are stored lowercased
pub type HeaderSet = BTreeMap<String, String>;

/// Value of `x-webhook-source` on ingested traffic
pub const SOURCE_MARKER: &str = "hook-keeper";

/// Value of `x-webhook-source` on resent traffic
pub const RESEND_SOURCE_MARKER: &str = "hook-keeper-resend";

/// Content type used when the inbound request carried none
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

pub const HEADER_FORWARDED_FOR: &str = "x-forwarded-for";
pub const HEADER_ORIGINAL_HOST: &str = "x-original-host";
pub const HEADER_WEBHOOK_SOURCE: &str = "x-webhook-source";
pub const HEADER_RESEND: &str = "x-resend";
pub const HEADER_ORIGINAL_REQUEST_ID: &str = "x-original-request-id";
pub const HEADER_CONTENT_TYPE: &str = "content-type";

const FALLBACK_FORWARDED_FOR: &str = "127.0.0.1";

/// Headers never copied from the inbound request
const STRIPPED_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "transfer-encoding",
    "x-forwarded-host",
    "x-forwarded-port",
    HEADER_ORIGINAL_HOST,
    HEADER_RESEND,
    HEADER_ORIGINAL_REQUEST_ID,
    HEADER_CONTENT_TYPE,
];

/// Why a request is being sent to a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Live forwarding of a request that just arrived
    Ingest,

    /// Manual replay of a ledger record
    Resend { original_request_id: RequestId },
}

impl Provenance {
    fn source_marker(&self) -> &'static str {
        match self {
            Self::Ingest => SOURCE_MARKER,
            Self::Resend { .. } => RESEND_SOURCE_MARKER,
        }
    }
}

/// Produce the outbound header set for one forwarded request
///
/// `custom` headers are applied last and override everything else, including
/// the provenance headers.
pub fn sanitize_headers(inbound: &HeaderSet, provenance: Provenance, custom: &HeaderSet) -> HeaderSet {
    let lookup = |name: &str| {
        inbound
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    };

    let mut outbound: HeaderSet = inbound
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
        .filter(|(name, _)| !STRIPPED_HEADERS.contains(&name.as_str()))
        .collect();

    let forwarded_for = lookup(HEADER_FORWARDED_FOR)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(FALLBACK_FORWARDED_FOR);
    outbound.insert(HEADER_FORWARDED_FOR.to_string(), forwarded_for.to_string());

    if let Some(host) = lookup("host") {
        outbound.insert(HEADER_ORIGINAL_HOST.to_string(), host.to_string());
    }

    outbound.insert(
        HEADER_WEBHOOK_SOURCE.to_string(),
        provenance.source_marker().to_string(),
    );

    if let Provenance::Resend { original_request_id } = provenance {
        outbound.insert(HEADER_RESEND.to_string(), "true".to_string());
        outbound.insert(
            HEADER_ORIGINAL_REQUEST_ID.to_string(),
            original_request_id.to_string(),
        );
    }

    outbound.insert(
        HEADER_CONTENT_TYPE.to_string(),
        normalize_content_type(lookup(HEADER_CONTENT_TYPE)),
    );

    for (name, value) in custom {
        outbound.insert(name.to_ascii_lowercase(), value.clone());
    }

    outbound
}

/// First value of a possibly comma-joined content type
fn normalize_content_type(value: Option<&str>) -> String {
    value
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

#[cfg(test)]
#[path = "headers_tests.rs"]
mod tests;
