//! Incident Intake and History Routes
//!
//! - `POST /incident` - submit a report, blocking JSON or server-sent events
//! - `GET /incidents` - newest-first history

use std::convert::Infallible;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use copilot_core::{
    Disposition, GenerationMode, IncidentId, IncidentRecord, IncidentReport, StructuredResponse,
    Timestamp,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::ReceiverStream, StreamExt};

use crate::error::{ApiError, ApiResult};
use crate::services::{IntakeEvent, IntakeOutcome};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

/// Incident submission body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitIncidentRequest {
    pub category: String,
    /// Reporting agent; free text
    #[serde(default, alias = "agent_identifier")]
    pub agent: String,
    /// Raw incident description; may be empty
    #[serde(default, alias = "incident_text")]
    pub incident: String,
    #[serde(default)]
    pub mode: GenerationMode,
}

impl SubmitIncidentRequest {
    pub fn into_report(self) -> IncidentReport {
        IncidentReport::new(self.category, self.agent, self.incident)
    }
}

/// Persisted outcome of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IncidentResponse {
    pub id: IncidentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub timestamp: Timestamp,
    pub category: String,
    pub agent: String,
    pub disposition: Disposition,
    pub response: StructuredResponse,
    /// Raw model output
    pub raw_text: String,
}

impl From<IntakeOutcome> for IncidentResponse {
    fn from(outcome: IntakeOutcome) -> Self {
        let record = outcome.record;
        Self {
            id: record.id,
            timestamp: record.timestamp,
            category: record.category,
            agent: record.agent_identifier,
            disposition: outcome.disposition,
            response: record.structured_response,
            raw_text: record.raw_model_text,
        }
    }
}

/// Query parameters for the history listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct ListIncidentsParams {
    /// Maximum number of records to return
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IncidentListResponse {
    pub items: Vec<IncidentRecord>,
    pub count: usize,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /incident - Submit an incident report
///
/// Blocking mode answers with the persisted record. Streaming mode answers
/// with `chunk` events carrying raw model text, then one `record` or `error`
/// event.
#[cfg_attr(feature = "openapi", utoipa::path(
    post,
    path = "/incident",
    tag = "Incidents",
    request_body = SubmitIncidentRequest,
    responses(
        (status = 200,
            description = "Incident recorded; streaming mode answers with server-sent events",
            content(
                (IncidentResponse = "application/json"),
                (String = "text/event-stream"),
            )),
        (status = 400, description = "Unknown category or malformed body", body = ApiError),
        (status = 503, description = "Incident store unavailable or shutting down",
            body = ApiError),
    ),
))]
pub async fn submit_incident(
    State(state): State<AppState>,
    payload: Result<Json<SubmitIncidentRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let mode = request.mode;
    let report = request.into_report();

    match mode {
        GenerationMode::Blocking => {
            let outcome = state.intake.submit(report).await?;
            Ok(Json(IncidentResponse::from(outcome)).into_response())
        }
        GenerationMode::Streaming => {
            let rx = state.intake.submit_streaming(report)?;
            let events = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(sse_event(event)));
            Ok(Sse::new(events)
                .keep_alive(KeepAlive::default())
                .into_response())
        }
    }
}

/// GET /incidents - Recent incidents, newest first
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/incidents",
    tag = "Incidents",
    params(ListIncidentsParams),
    responses(
        (status = 200, description = "Recent incidents", body = IncidentListResponse),
        (status = 400, description = "Limit out of range", body = ApiError),
        (status = 503, description = "Incident store unavailable or shutting down",
            body = ApiError),
    ),
))]
pub async fn list_incidents(
    State(state): State<AppState>,
    params: Result<Query<ListIncidentsParams>, QueryRejection>,
) -> ApiResult<Json<IncidentListResponse>> {
    let Query(params) = params?;
    let items = state.intake.list_recent(params.limit).await?;
    Ok(Json(IncidentListResponse {
        count: items.len(),
        items,
    }))
}

// ============================================================================
// SERVER-SENT EVENTS
// ============================================================================

fn sse_event(event: IntakeEvent) -> Event {
    match event {
        IntakeEvent::Chunk(text) => Event::default().event("chunk").data(sse_safe(&text)),
        IntakeEvent::Recorded(outcome) => json_event("record", &IncidentResponse::from(outcome)),
        IntakeEvent::Failed(err) => json_event("error", &err),
    }
}

fn json_event<T: Serialize>(name: &str, body: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(body)
        .unwrap_or_else(|e| {
            tracing::error!(event = name, error = %e, "Failed to encode event");
            Event::default()
                .event("error")
                .data(format!("failed to encode {} event", name))
        })
}

/// SSE data lines cannot carry carriage returns.
fn sse_safe(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/incident", post(submit_incident))
        .route("/incidents", get(list_incidents))
        .with_state(state)
}
