//! OpenAPI Specification for the Copilot API
//!
//! Generated with utoipa from route annotations and schema derives.

use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::agent::{self, AgentConnectResponse};
use crate::routes::categories::{self, CategoriesResponse};
use crate::routes::health::{self, ComponentHealth, HealthResponse, LivenessResponse};
use crate::routes::incident::{
    self, IncidentListResponse, IncidentResponse, SubmitIncidentRequest,
};
use crate::telemetry::metrics;

use copilot_core::{
    Disposition, GenerationMode, HealthStatus, IncidentRecord, Severity, StructuredResponse,
};

/// OpenAPI document for the copilot HTTP surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Incident Copilot API",
        version = "0.1.0",
        description = "Incident intake with model-assisted triage and incident history",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local Development")
    ),
    tags(
        (name = "Incidents", description = "Incident submission and history"),
        (name = "Categories", description = "Configured incident categories"),
        (name = "Agents", description = "Agent onboarding"),
        (name = "Health", description = "Liveness and dependency health"),
        (name = "Observability", description = "Prometheus metrics")
    ),
    paths(
        incident::submit_incident,
        incident::list_incidents,
        categories::list_categories,
        agent::agent_connect,
        health::health,
        health::liveness,
        metrics::metrics_handler,
    ),
    components(schemas(
        ApiError,
        ErrorCode,
        SubmitIncidentRequest,
        IncidentResponse,
        IncidentListResponse,
        IncidentRecord,
        StructuredResponse,
        Severity,
        Disposition,
        GenerationMode,
        CategoriesResponse,
        AgentConnectResponse,
        HealthResponse,
        ComponentHealth,
        LivenessResponse,
        HealthStatus,
    ))
)]
pub struct ApiDoc;
