//! Agent onboarding endpoint
//!
//! Hands out the one-line install command for the bundled agents.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Agents that ship an install script.
pub const KNOWN_AGENTS: &[&str] = &["linux_agent", "aws_agent", "db_agent"];

/// Returned for agents without an install script.
pub const NO_INSTALL_SCRIPT: &str = "No agent install script available. See docs.";

/// Install command for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AgentConnectResponse {
    /// Agent name as requested
    pub agent: String,
    /// Shell one-liner, or an explanation when none exists
    pub command: String,
}

/// Install one-liner for `agent`, matched case-insensitively.
pub fn connect_command(public_url: &str, agent: &str) -> String {
    let name = agent.to_ascii_lowercase();
    match KNOWN_AGENTS.iter().find(|known| **known == name) {
        Some(known) => format!(
            "curl -sSL {}/agents/{}/install.sh | bash",
            public_url.trim_end_matches('/'),
            known
        ),
        None => NO_INSTALL_SCRIPT.to_string(),
    }
}

/// GET /agent/{agent}/connect - Install command for an agent
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/agent/{agent}/connect",
    tag = "Agents",
    params(
        ("agent" = String, Path, description = "Agent name, e.g. linux_agent"),
    ),
    responses(
        (status = 200, description = "Install command", body = AgentConnectResponse),
    ),
))]
pub async fn agent_connect(
    State(state): State<AppState>,
    Path(agent): Path<String>,
) -> Json<AgentConnectResponse> {
    let command = connect_command(&state.public_url, &agent);
    tracing::debug!(%agent, known = command != NO_INSTALL_SCRIPT, "Agent connect requested");
    Json(AgentConnectResponse { agent, command })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/:agent/connect", get(agent_connect))
        .with_state(state)
}
