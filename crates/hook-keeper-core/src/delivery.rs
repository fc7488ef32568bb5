//! # Delivery Attempts
//!
//! One HTTP call to one destination, bounded by a timeout. The attempter
//! never fails: every outcome, including timeouts and connection errors, is
//! folded into an [`AttemptResult`] that also carries the elapsed time.

use crate::headers::HeaderSet;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default `User-Agent` for outbound deliveries
pub const DEFAULT_USER_AGENT: &str = concat!("hook-keeper/", env!("CARGO_PKG_VERSION"));

/// A fully prepared request for one destination
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub url: String,
    pub method: String,
    pub headers: HeaderSet,
    pub body: String,
    pub timeout: Duration,
}

impl OutboundRequest {
    /// Whether the body is transmitted; GET and HEAD never carry one
    pub fn sends_body(&self) -> bool {
        !matches!(self.method.to_ascii_uppercase().as_str(), "GET" | "HEAD")
    }
}

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// The destination answered, whatever the status code
    Responded {
        status_code: u16,
        body: String,
        elapsed_ms: u64,
    },

    /// No response was obtained (DNS, TLS, refused connection, timeout, ...)
    Failed { error: String, elapsed_ms: u64 },
}

impl AttemptResult {
    pub fn elapsed_ms(&self) -> u64 {
        match self {
            Self::Responded { elapsed_ms, .. } | Self::Failed { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Self::Responded { .. })
    }
}

/// Errors constructing an attempter
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Failed to create HTTP client: {message}")]
    ClientBuild { message: String },
}

/// Interface for performing one delivery attempt
#[async_trait]
pub trait DeliveryAttempter: Send + Sync {
    /// Send `request` and wait for the response or the timeout
    async fn attempt(&self, request: &OutboundRequest) -> AttemptResult;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// Delivery attempter backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpDeliveryAttempter {
    client: reqwest::Client,
}

impl HttpDeliveryAttempter {
    /// Build an attempter with its own connection pool
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::ClientBuild` if the HTTP client cannot be created.
    pub fn new(user_agent: &str) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| DeliveryError::ClientBuild {
                message: e.to_string(),
            })?;
        Ok(Self { client })
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build_header_map(headers: &HeaderSet) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => warn!(header = %name, "Dropping header that is not valid on the wire"),
            }
        }
        map
    }
}

#[async_trait]
impl DeliveryAttempter for HttpDeliveryAttempter {
    async fn attempt(&self, request: &OutboundRequest) -> AttemptResult {
        let start = Instant::now();
        let elapsed_ms = |start: Instant| start.elapsed().as_millis() as u64;

        let method = match reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
        {
            Ok(method) => method,
            Err(_) => {
                return AttemptResult::Failed {
                    error: format!("Invalid HTTP method: {}", request.method),
                    elapsed_ms: elapsed_ms(start),
                }
            }
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .headers(Self::build_header_map(&request.headers))
            .timeout(request.timeout);

        if request.sends_body() {
            builder = builder.body(request.body.clone());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                return AttemptResult::Failed {
                    error: describe_transport_error(&e, request.timeout),
                    elapsed_ms: elapsed_ms(start),
                }
            }
        };

        let status_code = response.status().as_u16();
        match response.text().await {
            Ok(body) => {
                debug!(
                    destination = %request.url,
                    status_code,
                    elapsed_ms = elapsed_ms(start),
                    "Destination responded"
                );
                AttemptResult::Responded {
                    status_code,
                    body,
                    elapsed_ms: elapsed_ms(start),
                }
            }
            Err(e) => AttemptResult::Failed {
                error: describe_transport_error(&e, request.timeout),
                elapsed_ms: elapsed_ms(start),
            },
        }
    }
}

fn describe_transport_error(error: &reqwest::Error, timeout: Duration) -> String {
    if error.is_timeout() {
        format!("Request timed out after {}s", timeout.as_secs())
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else if error.is_builder() {
        format!("Invalid destination: {}", error)
    } else {
        error.to_string()
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
