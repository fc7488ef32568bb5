//! Metrics collection for the API service.
//!
//! Metrics live on a registry owned by [`ServiceMetrics`] rather than the
//! process-global default registry, so several routers can coexist in one
//! process.

use hook_keeper_core::{forwarder::DeliveryOutcome, loop_guard::SELF_REFERENCE_ERROR};
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Service metrics for observability
#[derive(Debug)]
pub struct ServiceMetrics {
    registry: Registry,

    /// Ingestion requests by outcome label
    pub ingest_requests_total: IntCounterVec,

    /// Time spent forwarding an ingested request
    pub delivery_duration_seconds: Histogram,

    /// Resend attempts by outcome label
    pub resend_attempts_total: IntCounterVec,

    /// Destinations refused by the loop guard
    pub loop_blocks_total: IntCounter,
}

impl ServiceMetrics {
    pub fn new() -> Result<Arc<Self>, prometheus::Error> {
        let registry = Registry::new();

        let ingest_requests_total = IntCounterVec::new(
            Opts::new(
                "hook_ingest_requests_total",
                "Inbound webhook requests by outcome",
            ),
            &["outcome"],
        )?;
        let delivery_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "hook_delivery_duration_seconds",
                "Time spent forwarding an inbound request",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
        )?;
        let resend_attempts_total = IntCounterVec::new(
            Opts::new(
                "hook_resend_attempts_total",
                "Resend attempts by outcome",
            ),
            &["outcome"],
        )?;
        let loop_blocks_total = IntCounter::new(
            "hook_loop_blocks_total",
            "Destinations refused because they point at this service",
        )?;

        registry.register(Box::new(ingest_requests_total.clone()))?;
        registry.register(Box::new(delivery_duration_seconds.clone()))?;
        registry.register(Box::new(resend_attempts_total.clone()))?;
        registry.register(Box::new(loop_blocks_total.clone()))?;

        Ok(Arc::new(Self {
            registry,
            ingest_requests_total,
            delivery_duration_seconds,
            resend_attempts_total,
            loop_blocks_total,
        }))
    }

    /// Count one ingestion outcome
    pub fn record_ingest(&self, outcome: &str) {
        self.ingest_requests_total.with_label_values(&[outcome]).inc();
    }

    /// Record a forward or resend result and any loop-guard refusal in it
    pub fn record_delivery(&self, outcome: &DeliveryOutcome, elapsed_seconds: f64) {
        self.delivery_duration_seconds.observe(elapsed_seconds);
        if outcome.error.as_deref() == Some(SELF_REFERENCE_ERROR) {
            self.loop_blocks_total.inc();
        }
    }

    pub fn record_resend(&self, success: bool, refused: bool) {
        let label = if success { "success" } else { "failed" };
        self.resend_attempts_total.with_label_values(&[label]).inc();
        if refused {
            self.loop_blocks_total.inc();
        }
    }

    /// Prometheus text exposition of all metrics
    pub fn render(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
