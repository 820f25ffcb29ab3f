//! Copilot Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the
//! intake pipeline, model gateway and incident store.

pub mod metrics;
pub mod tracer;

pub use metrics::{global_metrics, metrics_handler, CopilotMetrics, METRICS};
pub use tracer::init_tracer;
