//! Shared router construction for API integration tests.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use copilot_api::{create_api_router, ApiConfig, AppState, IntakeContext, IntakeService};
use copilot_context::PromptBuilder;
use copilot_core::IntakeConfig;
use copilot_test_utils::{fixtures, IncidentStore, ScriptedGateway};
use tower::ServiceExt;

pub const PUBLIC_URL: &str = "https://copilot.example.net";

/// Router over the standard categories with the given gateway and store.
pub fn test_app(
    gateway: ScriptedGateway,
    store: Arc<dyn IncidentStore>,
) -> (Router, IntakeService) {
    let intake = IntakeService::new(IntakeContext {
        categories: Arc::new(fixtures::standard_categories()),
        prompts: PromptBuilder::new(),
        gateway: Arc::new(gateway),
        store,
        config: IntakeConfig::default(),
    });
    let state = AppState::new(intake.clone(), PUBLIC_URL);
    let router = create_api_router(state, &ApiConfig::default());
    (router, intake)
}

/// Send one request and return the status and collected body.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Result<(StatusCode, Vec<u8>), String> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let request = builder
        .body(body)
        .map_err(|e| format!("Failed to build request: {}", e))?;

    let response = router
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| format!("Request failed: {}", e))?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| format!("Failed to read body: {}", e))?;
    Ok((status, bytes.to_vec()))
}

/// Like [`send`], decoding the body as JSON.
pub async fn send_json(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Result<(StatusCode, serde_json::Value), String> {
    let (status, bytes) = send(router, method, uri, body).await?;
    let json = serde_json::from_slice(&bytes)
        .map_err(|e| format!("Body is not JSON ({}): {}", e, String::from_utf8_lossy(&bytes)))?;
    Ok((status, json))
}
