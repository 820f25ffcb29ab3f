//! Copilot API - HTTP Intake Service
//!
//! Axum server exposing incident submission (blocking or streamed),
//! incident history, category listing, agent onboarding, health and
//! Prometheus metrics. The intake pipeline itself lives in
//! [`services::IntakeService`].

pub mod config;
pub mod error;
#[cfg(feature = "openapi")]
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;

pub use config::{ApiConfig, LogFormat};
pub use error::{ApiError, ApiResult, ErrorCode};
#[cfg(feature = "openapi")]
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use services::{IntakeContext, IntakeEvent, IntakeOutcome, IntakeService};
pub use state::AppState;
