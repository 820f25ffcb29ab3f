//! Prometheus Metrics Definitions
//!
//! Defines the copilot metrics with their labels and types and exposes a
//! /metrics endpoint for Prometheus scraping.

use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse};
use copilot_core::ModelError;
use copilot_llm::GatewayObserver;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    Encoder, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// Model call latency buckets (seconds). Local models routinely take minutes.
const MODEL_LATENCY_BUCKETS: &[f64] = &[
    0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

/// Store operation latency buckets (seconds)
const STORE_LATENCY_BUCKETS: &[f64] =
    &[0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0];

/// Global metrics instance, registered on first use
pub static METRICS: Lazy<ApiResult<CopilotMetrics>> = Lazy::new(CopilotMetrics::new);

/// The registered metrics, or `None` if registration failed.
pub fn global_metrics() -> Option<&'static CopilotMetrics> {
    METRICS.as_ref().ok()
}

/// Container for all copilot metrics.
#[derive(Clone)]
pub struct CopilotMetrics {
    /// Intake outcomes - labels: disposition
    pub intake_total: CounterVec,

    /// Model transport attempts - labels: transport, status
    pub model_requests_total: CounterVec,

    /// Transitions from one transport to the next
    pub model_fallback_total: Counter,

    /// Model transport latency - labels: transport
    pub model_latency_seconds: HistogramVec,

    /// Model answers with no recoverable structured object
    pub parse_degraded_total: Counter,

    /// Store operations - labels: operation, status
    pub store_operations_total: CounterVec,

    /// Store operation latency - labels: operation
    pub store_operation_duration_seconds: HistogramVec,
}

fn registration_failed(name: &'static str) -> impl FnOnce(prometheus::Error) -> ApiError {
    move |e| ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

impl CopilotMetrics {
    /// Create and register all metrics with the default Prometheus registry.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            intake_total: register_counter_vec!(
                "copilot_intake_total",
                "Incident submissions by terminal disposition",
                &["disposition"]
            )
            .map_err(registration_failed("intake_total"))?,

            model_requests_total: register_counter_vec!(
                "copilot_model_requests_total",
                "Model transport attempts",
                &["transport", "status"]
            )
            .map_err(registration_failed("model_requests_total"))?,

            model_fallback_total: register_counter!(
                "copilot_model_fallback_total",
                "Fallbacks from one model transport to the next"
            )
            .map_err(registration_failed("model_fallback_total"))?,

            model_latency_seconds: register_histogram_vec!(
                "copilot_model_latency_seconds",
                "Model transport latency in seconds",
                &["transport"],
                MODEL_LATENCY_BUCKETS.to_vec()
            )
            .map_err(registration_failed("model_latency_seconds"))?,

            parse_degraded_total: register_counter!(
                "copilot_parse_degraded_total",
                "Model answers parsed through the degraded fallback"
            )
            .map_err(registration_failed("parse_degraded_total"))?,

            store_operations_total: register_counter_vec!(
                "copilot_store_operations_total",
                "Incident store operations",
                &["operation", "status"]
            )
            .map_err(registration_failed("store_operations_total"))?,

            store_operation_duration_seconds: register_histogram_vec!(
                "copilot_store_operation_duration_seconds",
                "Incident store operation duration in seconds",
                &["operation"],
                STORE_LATENCY_BUCKETS.to_vec()
            )
            .map_err(registration_failed("store_operation_duration_seconds"))?,
        })
    }

    /// Record the terminal disposition of one submission.
    pub fn record_intake(&self, disposition: &str) {
        self.intake_total.with_label_values(&[disposition]).inc();
    }

    pub fn record_parse_degraded(&self) {
        self.parse_degraded_total.inc();
    }

    /// Record an incident store operation.
    pub fn record_store_operation(&self, operation: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.store_operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.store_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

impl GatewayObserver for CopilotMetrics {
    fn on_attempt(&self, transport: &str, ok: bool, elapsed: Duration) {
        let status = if ok { "success" } else { "error" };
        self.model_requests_total
            .with_label_values(&[transport, status])
            .inc();
        self.model_latency_seconds
            .with_label_values(&[transport])
            .observe(elapsed.as_secs_f64());
    }

    fn on_fallback(&self, _from: &str, _to: &str, _reason: &ModelError) {
        self.model_fallback_total.inc();
    }
}

/// Handler for GET /metrics endpoint.
///
/// Returns Prometheus text format metrics.
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format",
            content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
))]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
