//! Health Check Endpoints
//!
//! - /health - Aggregate status of the model backend and the incident store
//! - /health/live - Process alive check
//!
//! The model being unreachable degrades the service; the store being
//! unusable makes it unhealthy, since no incident could be recorded.

use std::collections::HashMap;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use copilot_core::{HealthCheck, HealthStatus};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Aggregate health response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Model identifier sent to the backend
    pub model_id: String,
    pub model: ComponentHealth,
    pub store: ComponentHealth,
    /// Number of loaded categories
    pub categories: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

impl From<HealthCheck> for ComponentHealth {
    fn from(check: HealthCheck) -> Self {
        let error = if check.status == HealthStatus::Healthy {
            None
        } else {
            check.message
        };
        Self {
            status: check.status,
            latency_ms: check.response_time_ms.and_then(|ms| u64::try_from(ms).ok()),
            error,
            details: check.metadata,
        }
    }
}

/// Liveness response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LivenessResponse {
    pub status: HealthStatus,
    pub message: String,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/live - Process liveness check
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Process is alive", body = LivenessResponse),
    ),
))]
pub async fn liveness() -> impl IntoResponse {
    let response = LivenessResponse {
        status: HealthStatus::Healthy,
        message: "Process is alive".to_string(),
    };
    (StatusCode::OK, Json(response))
}

/// GET /health - Model reachability and store usability
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Healthy, or degraded with the model unreachable",
            body = HealthResponse),
        (status = 503, description = "Incident store unusable", body = HealthResponse),
    ),
))]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let gateway = state.intake.gateway();
    let (model_check, store_health) = tokio::join!(gateway.ping(), check_store(&state));
    let model_health = ComponentHealth::from(model_check);

    let overall_status = overall(model_health.status, store_health.status);
    if overall_status != HealthStatus::Healthy {
        tracing::warn!(
            status = ?overall_status,
            model = ?model_health.status,
            store = ?store_health.status,
            "Health check not fully healthy"
        );
    }

    let response = HealthResponse {
        status: overall_status,
        model_id: gateway.model_id().to_string(),
        model: model_health,
        store: store_health,
        categories: state.intake.categories().len(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    let status_code = if overall_status == HealthStatus::Unhealthy {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(response))
}

/// Store failure dominates; otherwise the model decides healthy vs degraded.
pub fn overall(model: HealthStatus, store: HealthStatus) -> HealthStatus {
    if store != HealthStatus::Healthy {
        HealthStatus::Unhealthy
    } else if model == HealthStatus::Healthy {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

async fn check_store(state: &AppState) -> ComponentHealth {
    let start = Instant::now();

    match state.intake.store().health_check().await {
        Ok(stats) => {
            let mut details = HashMap::new();
            details.insert("record_count".to_string(), serde_json::json!(stats.record_count));
            details.insert("last_id".to_string(), serde_json::json!(stats.last_id));
            ComponentHealth {
                status: HealthStatus::Healthy,
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
                details: Some(details),
            }
        }
        Err(e) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(format!("Store check failed: {}", e)),
            details: None,
        },
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/live", get(liveness))
        .with_state(state)
}
