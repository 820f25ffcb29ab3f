//! API Configuration Module
//!
//! Settings owned by the HTTP process: bind address, CORS, the category
//! file location and log output. Model, store and intake settings live in
//! `copilot_core::config`.

use std::net::SocketAddr;
use std::path::PathBuf;

use copilot_core::config::env_any;

use crate::error::{ApiError, ApiResult};

// ============================================================================
// LOG FORMAT
// ============================================================================

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "pretty" | "text" | "plain" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

/// HTTP process configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Host or IP to bind.
    pub bind_host: String,

    pub port: u16,

    /// Externally reachable base URL, used in agent install commands.
    pub public_url: String,

    /// Allowed CORS origins (comma-separated in env var).
    /// Empty means allow all origins.
    pub cors_origins: Vec<String>,

    /// YAML file holding the category templates.
    pub categories_file: PathBuf,

    /// Start with an empty category set when the file is unreadable.
    pub allow_empty_categories: bool,

    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8000,
            public_url: "http://localhost:8000".to_string(),
            cors_origins: Vec::new(),
            categories_file: PathBuf::from("./incident_categories.yml"),
            allow_empty_categories: false,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `COPILOT_API_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT` or `COPILOT_API_PORT`: listen port (default: 8000)
    /// - `COPILOT_PUBLIC_URL` (or `PUBLIC_API_URL`): base URL for install commands
    /// - `COPILOT_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `COPILOT_CATEGORIES_FILE` (or `CATEGORIES_FILE`): category YAML path
    /// - `COPILOT_ALLOW_EMPTY_CATEGORIES`: "true" to start without categories
    /// - `COPILOT_LOG_FORMAT`: "json" or "pretty" (default: json)
    ///
    /// # Errors
    /// `InvalidInput` if the port is not a number.
    pub fn from_env() -> ApiResult<Self> {
        let defaults = Self::default();

        let port = match env_any(&["PORT", "COPILOT_API_PORT"]) {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", value)))?,
            None => defaults.port,
        };

        let cors_origins = env_any(&["COPILOT_CORS_ORIGINS"])
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_host: env_any(&["COPILOT_API_BIND"]).unwrap_or(defaults.bind_host),
            port,
            public_url: env_any(&["COPILOT_PUBLIC_URL", "PUBLIC_API_URL"])
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            cors_origins,
            categories_file: env_any(&["COPILOT_CATEGORIES_FILE", "CATEGORIES_FILE"])
                .map(PathBuf::from)
                .unwrap_or(defaults.categories_file),
            allow_empty_categories: env_any(&["COPILOT_ALLOW_EMPTY_CATEGORIES"])
                .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(defaults.allow_empty_categories),
            log_format: env_any(&["COPILOT_LOG_FORMAT"])
                .map(|s| LogFormat::from_label(&s))
                .unwrap_or(defaults.log_format),
        })
    }

    /// Socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }

    pub fn validate(&self) -> ApiResult<()> {
        self.bind_addr()?;
        if !(self.public_url.starts_with("http://") || self.public_url.starts_with("https://")) {
            return Err(ApiError::invalid_input(format!(
                "Public URL must start with http:// or https://, got {}",
                self.public_url
            )));
        }
        Ok(())
    }

    /// Whether CORS is restricted to an explicit origin list.
    pub fn is_cors_restricted(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}
