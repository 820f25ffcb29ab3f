//! Shared application state for Axum routers.

use std::time::Instant;

use crate::services::IntakeService;

/// Application-wide state shared across all routes.
#[derive(Debug, Clone)]
pub struct AppState {
    pub intake: IntakeService,
    /// Base URL used in agent install commands, without trailing slash.
    pub public_url: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(intake: IntakeService, public_url: impl Into<String>) -> Self {
        Self {
            intake,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            start_time: Instant::now(),
        }
    }
}
