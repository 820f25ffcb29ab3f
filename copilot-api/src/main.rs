//! Incident Copilot API Server Entry Point
//!
//! Loads configuration and the category file, opens the incident store,
//! wires the model gateway and starts the Axum HTTP server.

use std::sync::Arc;

use axum::Router;
use copilot_api::telemetry::{global_metrics, init_tracer};
use copilot_api::{
    create_api_router, ApiConfig, ApiError, ApiResult, AppState, IntakeContext, IntakeService,
};
use copilot_context::PromptBuilder;
use copilot_core::{CategorySet, GatewayConfig, HealthStatus, IntakeConfig, StoreConfig};
use copilot_llm::{FallbackGateway, ModelBackend, ModelGateway, OllamaHttpBackend, ProcessBackend};
use copilot_storage::LmdbIncidentStore;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let api_config = ApiConfig::from_env()?;
    api_config.validate()?;
    init_tracer(api_config.log_format)?;

    let gateway_config = GatewayConfig::from_env();
    gateway_config.validate()?;
    let store_config = StoreConfig::from_env();
    store_config.validate()?;
    let intake_config = IntakeConfig::from_env();
    intake_config.validate()?;

    let categories = load_categories(&api_config)?;
    let prompts = PromptBuilder::new();
    prompts.check_categories(&categories)?;

    let store = LmdbIncidentStore::from_config(&store_config)?;
    tracing::info!(path = %store.path().display(), "Incident store opened");

    let gateway = build_gateway(&gateway_config)?;
    let reachability = gateway.ping().await;
    if reachability.status != HealthStatus::Healthy {
        tracing::warn!(
            model = %gateway.model_id(),
            message = ?reachability.message,
            "Model backend not reachable at startup; submissions will record model failures"
        );
    }

    let intake = IntakeService::new(IntakeContext {
        categories: Arc::new(categories),
        prompts,
        gateway,
        store: Arc::new(store),
        config: intake_config,
    });

    let state = AppState::new(intake.clone(), api_config.public_url.clone());
    let app: Router = create_api_router(state, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting incident copilot API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    intake.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received; draining connections");
}

fn load_categories(config: &ApiConfig) -> ApiResult<CategorySet> {
    match CategorySet::load(&config.categories_file) {
        Ok(categories) => {
            tracing::info!(
                file = %config.categories_file.display(),
                count = categories.len(),
                "Loaded incident categories"
            );
            Ok(categories)
        }
        Err(e) if config.allow_empty_categories => {
            tracing::warn!(
                file = %config.categories_file.display(),
                error = %e,
                "Category file unusable; starting with no categories"
            );
            Ok(CategorySet::empty())
        }
        Err(e) => Err(e.into()),
    }
}

fn build_gateway(config: &GatewayConfig) -> ApiResult<Arc<dyn ModelGateway>> {
    let primary: Arc<dyn ModelBackend> = Arc::new(OllamaHttpBackend::new(config)?);
    let secondary = config.process_binary.as_ref().map(|binary| {
        Arc::new(ProcessBackend::new(binary.clone(), config.model.clone())) as Arc<dyn ModelBackend>
    });

    let mut gateway = FallbackGateway::new(primary, secondary, config.model.clone());
    if let Some(metrics) = global_metrics() {
        gateway = gateway.with_observer(Arc::new(metrics.clone()));
    }
    Ok(Arc::new(gateway))
}
