//! # Hook-Keeper HTTP Service
//!
//! HTTP surface of the Hook-Keeper webhook relay.
//!
//! This service provides:
//! - The public ingestion endpoint `/api/w/{endpoint}`
//! - Resend and ledger inspection endpoints for a webhook
//! - A built-in echo destination for trying out forwarding
//! - Health, readiness, and Prometheus metrics endpoints

pub mod config;
pub mod errors;
pub mod metrics;
pub mod responses;

pub use config::{
    DeliveryConfig, LoggingConfig, SeedWebhookConfig, ServerConfig, ServiceConfig, StorageBackend,
    StorageConfig,
};
pub use errors::{ConfigError, IngestHandlerError, ResendHandlerError, ServiceError};
pub use metrics::ServiceMetrics;
pub use responses::*;

use axum::{
    extract::{DefaultBodyLimit, Path, Query, RawQuery, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{any, get, post},
    Router,
};
use bytes::Bytes;
use hook_keeper_core::{
    ledger::QueryParams, loop_guard::SELF_REFERENCE_ERROR, DeliveryAttempter, EndpointToken,
    FailoverForwarder, HeaderSet, InboundRequest, IngestError, RequestId, RequestLedger,
    ResendOrchestrator, ResendTarget, Storage, Timestamp, WebhookId, WebhookIngestor,
};
use std::{future::IntoFuture, sync::Arc, time::Duration, time::Instant};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn, Instrument};

/// Methods accepted on the ingestion endpoint
pub const FORWARDABLE_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Records returned by the ledger listing when no limit is given
pub const DEFAULT_REQUEST_LIST_LIMIT: usize = 20;

/// Upper bound on the ledger listing limit
pub const MAX_REQUEST_LIST_LIMIT: usize = 100;

const CORRELATION_ID_HEADER: &str = "x-correlation-id";

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Webhook and ledger persistence
    pub storage: Arc<dyn Storage>,

    /// Ingestion pipeline
    pub ingestor: WebhookIngestor,

    /// Resend pipeline
    pub resender: ResendOrchestrator,

    /// Ledger read access
    pub ledger: RequestLedger,

    /// Metrics collector for observability
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    /// Wire the pipelines from configuration and collaborators
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the loop guard cannot be built from
    /// the listener address and configured self base URLs.
    pub fn new(
        config: ServiceConfig,
        storage: Arc<dyn Storage>,
        attempter: Arc<dyn DeliveryAttempter>,
        metrics: Arc<ServiceMetrics>,
    ) -> Result<Self, ConfigError> {
        if config.delivery.self_base_urls.is_empty() && config.delivery.public_base_url.is_none() {
            warn!(
                port = config.server.port,
                "No public base URL configured; loop guard only knows the listener's own addresses"
            );
        }
        let loop_guard = Arc::new(config.loop_guard()?);
        let forwarder = FailoverForwarder::new(attempter, loop_guard);

        Ok(Self {
            ingestor: WebhookIngestor::new(storage.clone(), forwarder.clone()),
            resender: ResendOrchestrator::new(storage.clone(), forwarder)
                .with_concurrency(config.delivery.resend_concurrency),
            ledger: RequestLedger::new(storage.clone()),
            config: Arc::new(config),
            storage,
            metrics,
        })
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_size;

    let ingest_routes = Router::new().route("/api/w/{endpoint}", any(handle_ingest));

    let webhook_routes = Router::new()
        .route("/api/webhooks/{id}/resend", post(handle_resend))
        .route("/api/webhooks/{id}/requests", get(list_requests));

    let destination_routes = Router::new()
        .route("/api/destination/{path}", any(handle_destination))
        .route("/api/generate-destination", get(generate_destination));

    let health_routes = Router::new()
        .route("/health", get(handle_health_check))
        .route("/ready", get(handle_readiness_check));

    let observability_routes = Router::new().route("/metrics", get(metrics_endpoint));

    Router::new()
        .merge(ingest_routes)
        .merge(webhook_routes)
        .merge(destination_routes)
        .merge(health_routes)
        .merge(observability_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .layer(DefaultBodyLimit::max(body_limit))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Runs until SIGINT or SIGTERM, then drains in-flight requests for at most
/// `server.shutdown_timeout_seconds`.
pub async fn start_server(
    config: ServiceConfig,
    storage: Arc<dyn Storage>,
    attempter: Arc<dyn DeliveryAttempter>,
) -> Result<(), ServiceError> {
    let metrics = ServiceMetrics::new().map_err(|e| {
        ServiceError::Configuration(ConfigError::Invalid {
            message: format!("Failed to initialize metrics: {}", e),
        })
    })?;

    storage
        .health_check()
        .await
        .map_err(|e| ServiceError::HealthCheckFailed {
            message: e.to_string(),
        })?;

    let host = config.server.host.clone();
    let port = config.server.port;
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let state = AppState::new(config, storage, attempter, metrics)?;
    let app = create_router(state);

    let address = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!(address = %address, "Starting HTTP server");

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .into_future();

    let drain_deadline = async move {
        if shutdown_rx.changed().await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => {
            result.map_err(|e| ServiceError::ServerFailed {
                message: e.to_string(),
            })?;
        }
        _ = drain_deadline => {
            warn!(
                timeout_seconds = shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; dropping remaining connections"
            );
        }
    }

    info!("HTTP server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C signal handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

// ============================================================================
// Ingestion Handler
// ============================================================================

/// Handle a request on the public ingestion endpoint
///
/// The pipeline runs in its own task: if the client disconnects or the
/// request deadline passes, forwarding and the ledger completion still run
/// to the end.
///
/// On delivery the destination's status code and raw body are relayed with
/// `Content-Type: application/json`.
#[instrument(skip(state, raw_query, headers, body), fields(endpoint = %endpoint, method = %method))]
pub async fn handle_ingest(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, IngestHandlerError> {
    if !FORWARDABLE_METHODS.contains(&method.as_str()) {
        state.metrics.record_ingest("method_not_allowed");
        return Err(IngestHandlerError::MethodNotAllowed {
            allowed: FORWARDABLE_METHODS.iter().map(|m| m.to_string()).collect(),
        });
    }

    let request = InboundRequest {
        method: method.as_str().to_string(),
        headers: header_set(&headers),
        body: String::from_utf8_lossy(&body).into_owned(),
        query: parse_query(raw_query.as_deref()),
    };

    let ingestor = state.ingestor.clone();
    let metrics = state.metrics.clone();
    let task = tokio::spawn(
        async move {
            let started = Instant::now();
            let result = ingestor.ingest(&endpoint, request).await;
            match &result {
                Ok(receipt) => {
                    metrics.record_delivery(&receipt.outcome, started.elapsed().as_secs_f64());
                    let label = if receipt.outcome.is_delivered() {
                        "delivered"
                    } else {
                        "failed"
                    };
                    metrics.record_ingest(label);
                }
                Err(IngestError::NotFound) => metrics.record_ingest("not_found"),
                Err(IngestError::MethodNotAllowed { .. }) => {
                    metrics.record_ingest("method_not_allowed")
                }
                Err(_) => metrics.record_ingest("error"),
            }
            result
        }
        .instrument(tracing::Span::current()),
    );

    let seconds = state.config.server.request_timeout_seconds;
    let receipt = match tokio::time::timeout(Duration::from_secs(seconds), task).await {
        Err(_) => return Err(IngestHandlerError::Timeout { seconds }),
        Ok(Err(join_error)) => {
            return Err(IngestHandlerError::Internal {
                message: format!("Ingestion task failed: {}", join_error),
            })
        }
        Ok(Ok(result)) => result?,
    };

    let outcome = receipt.outcome;
    if let Some(error) = outcome.error {
        return Err(IngestHandlerError::DeliveryFailed { details: error });
    }

    let status = outcome
        .status_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .ok_or_else(|| IngestHandlerError::DeliveryFailed {
            details: "Destination returned an invalid status code".to_string(),
        })?;

    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        outcome.response_body.unwrap_or_default(),
    )
        .into_response())
}

/// Collapse a header map into one lowercased entry per name
///
/// Repeated headers are joined with `", "`.
fn header_set(headers: &HeaderMap) -> HeaderSet {
    headers
        .keys()
        .map(|name| {
            let joined = headers
                .get_all(name)
                .iter()
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), joined)
        })
        .collect()
}

fn parse_query(raw: Option<&str>) -> QueryParams {
    raw.map(|query| url::form_urlencoded::parse(query.as_bytes()).into_owned().collect())
        .unwrap_or_default()
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Replay a ledger record to the webhook's destinations or an explicit list
#[instrument(skip(state, body), fields(webhook_id = %id))]
async fn handle_resend(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ResendRequestBody>, axum::extract::rejection::JsonRejection>,
) -> Result<Json<ResendResponse>, ResendHandlerError> {
    let Json(body) = body.map_err(|e| ResendHandlerError::BadRequest {
        message: format!("Invalid request body: {}", e.body_text()),
    })?;

    let request_id = body
        .request_id
        .as_deref()
        .ok_or_else(|| ResendHandlerError::BadRequest {
            message: "requestId is required".to_string(),
        })?;

    let target = if body.resend_all {
        ResendTarget::All
    } else if let Some(urls) = body.destination_urls {
        ResendTarget::Urls(urls)
    } else {
        return Err(ResendHandlerError::BadRequest {
            message: "Must specify destinationUrls or set resendAll to true".to_string(),
        });
    };

    let webhook_id: WebhookId = id.parse().map_err(|_| ResendHandlerError::WebhookNotFound)?;
    let request_id: RequestId = request_id
        .parse()
        .map_err(|_| ResendHandlerError::RequestNotFound)?;

    let resender = state.resender.clone();
    let report = tokio::spawn(
        async move { resender.resend(webhook_id, request_id, target).await }
            .instrument(tracing::Span::current()),
    )
    .await
    .map_err(|e| ResendHandlerError::Internal {
        message: format!("Resend task failed: {}", e),
    })??;

    for result in &report.results {
        let refused = result.error.as_deref() == Some(SELF_REFERENCE_ERROR);
        state.metrics.record_resend(result.success, refused);
    }

    Ok(Json(report.into()))
}

/// Most recent ledger records of a webhook
#[instrument(skip(state, params), fields(webhook_id = %id))]
async fn list_requests(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<RequestListParams>,
) -> Result<Json<RequestListResponse>, ResendHandlerError> {
    let webhook_id: WebhookId = id.parse().map_err(|_| ResendHandlerError::WebhookNotFound)?;

    state
        .storage
        .find_webhook_by_id(webhook_id)
        .await
        .map_err(|e| ResendHandlerError::Internal {
            message: e.to_string(),
        })?
        .ok_or(ResendHandlerError::WebhookNotFound)?;

    let limit = params
        .limit
        .unwrap_or(DEFAULT_REQUEST_LIST_LIMIT)
        .clamp(1, MAX_REQUEST_LIST_LIMIT);

    let records = state
        .ledger
        .recent(webhook_id, limit)
        .await
        .map_err(|e| ResendHandlerError::Internal {
            message: e.to_string(),
        })?;

    let requests: Vec<RequestSummary> = records.into_iter().map(Into::into).collect();
    Ok(Json(RequestListResponse {
        webhook_id,
        total: requests.len(),
        requests,
    }))
}

// ============================================================================
// Destination Handlers
// ============================================================================

/// Built-in destination that acknowledges whatever it receives
#[instrument(skip(raw_query, headers, body), fields(path = %path, method = %method))]
async fn handle_destination(
    Path(path): Path<String>,
    method: Method,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let query_params = parse_query(raw_query.as_deref()).len();

    info!(
        headers = headers.keys_len(),
        body_size = body.len(),
        query_params,
        "Destination endpoint received request"
    );

    let echo = DestinationEchoResponse {
        success: true,
        message: format!("Request received at destination endpoint: {}", path),
        timestamp: timestamp.clone(),
        method: method.to_string(),
        received_data: ReceivedData {
            headers: headers.keys_len(),
            body_size: body.len(),
            query_params,
        },
    };

    let mut response = (StatusCode::OK, Json(echo)).into_response();
    if let Ok(value) = HeaderValue::from_str(&path) {
        response.headers_mut().insert("x-destination-path", value);
    }
    if let Ok(value) = HeaderValue::from_str(&timestamp) {
        response.headers_mut().insert("x-processed-at", value);
    }
    response
}

/// Generate a fresh echo destination URL
#[instrument(skip_all)]
async fn generate_destination(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<GeneratedDestinationResponse> {
    let random_path = EndpointToken::generate().to_string();

    let (base_url, is_public) = match &state.config.delivery.public_base_url {
        Some(public) => (public.trim_end_matches('/').to_string(), true),
        None => {
            let header_value = |name: &str| {
                headers
                    .get(name)
                    .and_then(|v| v.to_str().ok())
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            let protocol = header_value("x-forwarded-proto").unwrap_or_else(|| "https".to_string());
            let host = header_value("host")
                .unwrap_or_else(|| format!("localhost:{}", state.config.server.port));
            (format!("{}://{}", protocol, host), false)
        }
    };

    Json(GeneratedDestinationResponse {
        destination_url: format!("{}/api/destination/{}", base_url, random_path),
        random_path,
        base_url,
        is_public,
    })
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Basic liveness check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness check; fails while storage is unreachable
#[instrument(skip(state))]
async fn handle_readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    match state.storage.health_check().await {
        Ok(()) => Ok(Json(ReadinessResponse {
            ready: true,
            timestamp: Timestamp::now(),
        })),
        Err(e) => {
            warn!(error = %e, "Storage is not ready");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

// ============================================================================
// Observability Handlers
// ============================================================================

/// Prometheus metrics endpoint
#[instrument(skip_all)]
async fn metrics_endpoint(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.metrics.render().map_err(|e| {
        error!(error = %e, "Failed to encode metrics");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Uses the inbound `x-correlation-id` when present, otherwise generates one,
/// and echoes it on the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    let mut response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id) {
        response
            .headers_mut()
            .insert(CORRELATION_ID_HEADER, header_value);
    }

    let status = response.status();
    if status.is_server_error() {
        error!(method = %method, path = %path, status = %status, duration_ms, "Request completed with server error");
    } else if status.is_client_error() {
        warn!(method = %method, path = %path, status = %status, duration_ms, "Request completed with client error");
    } else {
        info!(method = %method, path = %path, status = %status, duration_ms, "Request completed");
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
