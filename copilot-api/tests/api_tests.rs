//! End-to-end tests for the HTTP surface, run against an in-process router.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use copilot_test_utils::{fixtures, FailingStore, InMemoryIncidentStore, ScriptedGateway};
use serde_json::json;

#[allow(dead_code)]
#[path = "support/app.rs"]
mod app_support;
use app_support::{send, send_json, test_app, PUBLIC_URL};

type TestResult = Result<(), String>;

fn submission(category: &str) -> serde_json::Value {
    json!({
        "category": category,
        "agent": "db_agent",
        "incident": "replica lag 900s on pg-2",
    })
}

// ============================================================================
// POST /incident
// ============================================================================

#[tokio::test]
async fn blocking_submission_returns_persisted_record() -> TestResult {
    let store = Arc::new(InMemoryIncidentStore::new());
    let (router, _) = test_app(ScriptedGateway::text(fixtures::PARSEABLE_OUTPUT), store.clone());

    let (status, body) =
        send_json(&router, Method::POST, "/incident", Some(submission("database_down"))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disposition"], "parsed");
    assert_eq!(body["category"], "database_down");
    assert_eq!(body["agent"], "db_agent");
    assert_eq!(body["response"]["severity"], "high");
    assert_eq!(body["response"]["commands"][0], "pg_isready -h db");
    assert_eq!(body["raw_text"], fixtures::PARSEABLE_OUTPUT);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn prose_answer_is_recorded_as_degraded() -> TestResult {
    let store = Arc::new(InMemoryIncidentStore::new());
    let (router, _) = test_app(ScriptedGateway::text(fixtures::PROSE_OUTPUT), store.clone());

    let (status, body) =
        send_json(&router, Method::POST, "/incident", Some(submission("high_cpu"))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disposition"], "degraded");
    assert_eq!(body["response"]["recommended_action"], "investigate");
    assert_eq!(body["response"]["notes"], fixtures::PROSE_OUTPUT);
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unreachable_model_still_records_incident() -> TestResult {
    let store = Arc::new(InMemoryIncidentStore::new());
    let (router, _) = test_app(ScriptedGateway::unavailable(), store.clone());

    let (status, body) =
        send_json(&router, Method::POST, "/incident", Some(submission("disk_full"))).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["disposition"], "model_failed");
    assert_eq!(body["response"]["recommended_action"], "investigate");
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn unknown_category_is_rejected_with_valid_names() -> TestResult {
    let store = Arc::new(InMemoryIncidentStore::new());
    let gateway = ScriptedGateway::text(fixtures::PARSEABLE_OUTPUT);
    let (router, _) = test_app(gateway, store.clone());

    let (status, body) =
        send_json(&router, Method::POST, "/incident", Some(submission("printer_on_fire"))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_CATEGORY");
    assert_eq!(
        body["details"]["valid_categories"],
        json!(["database_down", "disk_full", "high_cpu"])
    );
    assert!(store.is_empty());
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_invalid_input() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PARSEABLE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, body) =
        send_json(&router, Method::POST, "/incident", Some(json!({ "agent": "x" }))).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    Ok(())
}

#[tokio::test]
async fn store_failure_surfaces_as_service_unavailable() -> TestResult {
    let store = Arc::new(FailingStore::new());
    let (router, _) = test_app(ScriptedGateway::text(fixtures::PARSEABLE_OUTPUT), store.clone());

    let (status, body) =
        send_json(&router, Method::POST, "/incident", Some(submission("database_down"))).await?;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STORAGE_UNAVAILABLE");
    assert_eq!(store.attempts(), 1);
    Ok(())
}

#[tokio::test]
async fn streaming_submission_emits_chunks_then_record() -> TestResult {
    let store = Arc::new(InMemoryIncidentStore::new());
    let gateway = ScriptedGateway::chunks([r#"{"severity":"#, r#""low","fixes":["rotate logs"]}"#]);
    let (router, _) = test_app(gateway, store.clone());

    let mut body = submission("disk_full");
    body["mode"] = json!("streaming");
    let (status, bytes) = send(&router, Method::POST, "/incident", Some(body)).await?;
    let text = String::from_utf8_lossy(&bytes);

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text.matches("event: chunk").count(), 2);
    assert_eq!(text.matches("event: record").count(), 1);
    assert!(!text.contains("event: error"));

    let chunk_at = text.find("event: chunk").ok_or("no chunk event")?;
    let record_at = text.find("event: record").ok_or("no record event")?;
    assert!(chunk_at < record_at, "record must follow the chunks");

    assert!(text.contains(r#""disposition":"parsed""#));
    assert_eq!(store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn streaming_unknown_category_is_rejected_before_stream() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::chunks(["never sent"]),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let mut body = submission("nope");
    body["mode"] = json!("streaming");
    let (status, body) = send_json(&router, Method::POST, "/incident", Some(body)).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNKNOWN_CATEGORY");
    Ok(())
}

// ============================================================================
// GET /incidents
// ============================================================================

#[tokio::test]
async fn history_lists_newest_first() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    for category in ["database_down", "high_cpu", "disk_full"] {
        let (status, _) =
            send_json(&router, Method::POST, "/incident", Some(submission(category))).await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send_json(&router, Method::GET, "/incidents?limit=2", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["items"][0]["category"], "disk_full");
    assert_eq!(body["items"][1]["category"], "high_cpu");

    let (_, body) = send_json(&router, Method::GET, "/incidents", None).await?;
    assert_eq!(body["count"], 3);
    Ok(())
}

#[tokio::test]
async fn history_rejects_out_of_range_limits() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    for uri in ["/incidents?limit=0", "/incidents?limit=501"] {
        let (status, body) = send_json(&router, Method::GET, uri, None).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["code"], "INVALID_RANGE");
    }

    let (status, body) = send_json(&router, Method::GET, "/incidents?limit=ten", None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
    Ok(())
}

#[tokio::test]
async fn history_store_failure_is_service_unavailable() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(FailingStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/incidents", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "STORAGE_UNAVAILABLE");
    Ok(())
}

// ============================================================================
// CATEGORIES, AGENTS
// ============================================================================

#[tokio::test]
async fn categories_are_sorted() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/categories", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["categories"],
        json!(["database_down", "disk_full", "high_cpu"])
    );
    Ok(())
}

#[tokio::test]
async fn agent_connect_returns_install_command() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/agent/Linux_Agent/connect", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agent"], "Linux_Agent");
    assert_eq!(
        body["command"],
        format!("curl -sSL {}/agents/linux_agent/install.sh | bash", PUBLIC_URL)
    );

    let (status, body) =
        send_json(&router, Method::GET, "/agent/windows_agent/connect", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["command"], "No agent install script available. See docs.");
    Ok(())
}

// ============================================================================
// HEALTH, METRICS, OPENAPI
// ============================================================================

#[tokio::test]
async fn health_is_healthy_with_reachable_model() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_id"], "scripted:test");
    assert_eq!(body["categories"], 3);
    assert_eq!(body["store"]["details"]["record_count"], 0);
    Ok(())
}

#[tokio::test]
async fn health_is_degraded_without_model() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::unavailable(),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["model"]["status"], "unhealthy");
    assert_eq!(body["store"]["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn health_is_unhealthy_without_store() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(FailingStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/health", None).await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert!(body["store"]["error"].is_string());

    let (status, body) = send_json(&router, Method::GET, "/health/live", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn metrics_expose_intake_counters() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PARSEABLE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, _) =
        send_json(&router, Method::POST, "/incident", Some(submission("database_down"))).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, bytes) = send(&router, Method::GET, "/metrics", None).await?;
    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("copilot_intake_total"));
    assert!(text.contains("copilot_store_operations_total"));
    Ok(())
}

#[tokio::test]
#[cfg(feature = "openapi")]
async fn openapi_document_is_served() -> TestResult {
    let (router, _) = test_app(
        ScriptedGateway::text(fixtures::PROSE_OUTPUT),
        Arc::new(InMemoryIncidentStore::new()),
    );

    let (status, body) = send_json(&router, Method::GET, "/openapi.json", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/incident"].is_object());
    assert!(body["paths"]["/agent/{agent}/connect"].is_object());
    Ok(())
}
