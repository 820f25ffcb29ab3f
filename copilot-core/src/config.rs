//! Configuration types
//!
//! Every struct has a `Default`, a `from_env()` that falls back to those
//! defaults, and a `validate()` run once at startup.

use crate::{ConfigError, CopilotResult};
use std::path::PathBuf;
use std::time::Duration;

/// Read the first set variable among `names`.
pub fn env_any(names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

fn env_parse<T: std::str::FromStr>(names: &[&str]) -> Option<T> {
    env_any(names).and_then(|s| s.parse().ok())
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// MODEL GATEWAY
// ============================================================================

/// Model backend configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Base URL of the Ollama-compatible HTTP API
    pub endpoint: String,
    /// Model identifier sent with every generate call
    pub model: String,
    /// TCP connect timeout for the HTTP transport
    pub connect_timeout: Duration,
    /// Binary for the local process fallback; `None` disables it
    pub process_binary: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "mistral:7b".to_string(),
            connect_timeout: Duration::from_secs(10),
            process_binary: Some("ollama".to_string()),
        }
    }
}

impl GatewayConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `COPILOT_MODEL_ENDPOINT` (or `OLLAMA_API`): model API base URL
    /// - `COPILOT_MODEL`: model identifier (default: mistral:7b)
    /// - `COPILOT_MODEL_CONNECT_TIMEOUT_SECS`: connect timeout (default: 10)
    /// - `COPILOT_MODEL_PROCESS`: fallback binary, set to empty to disable (default: ollama)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let process_binary = match std::env::var("COPILOT_MODEL_PROCESS") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v.trim().to_string()),
            Err(_) => defaults.process_binary,
        };

        Self {
            endpoint: env_any(&["COPILOT_MODEL_ENDPOINT", "OLLAMA_API"])
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            model: env_any(&["COPILOT_MODEL"]).unwrap_or(defaults.model),
            connect_timeout: env_parse(&["COPILOT_MODEL_CONNECT_TIMEOUT_SECS"])
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            process_binary,
        }
    }

    pub fn validate(&self) -> CopilotResult<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(invalid(
                "endpoint",
                &self.endpoint,
                "must start with http:// or https://",
            )
            .into());
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "model".to_string(),
            }
            .into());
        }
        if self.connect_timeout.is_zero() {
            return Err(invalid("connect_timeout", "0", "must be positive").into());
        }
        Ok(())
    }
}

// ============================================================================
// INCIDENT STORE
// ============================================================================

/// Durable store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Directory holding the LMDB environment
    pub path: PathBuf,
    /// Maximum size of the memory map in megabytes
    pub map_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/incidents"),
            map_size_mb: 256,
        }
    }
}

impl StoreConfig {
    /// Environment variables:
    /// - `COPILOT_STORE_PATH` (or `DB_PATH`): store directory
    /// - `COPILOT_STORE_MAP_SIZE_MB`: map size (default: 256)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: env_any(&["COPILOT_STORE_PATH", "DB_PATH"])
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            map_size_mb: env_parse(&["COPILOT_STORE_MAP_SIZE_MB"]).unwrap_or(defaults.map_size_mb),
        }
    }

    pub fn validate(&self) -> CopilotResult<()> {
        if self.map_size_mb == 0 {
            return Err(invalid("map_size_mb", 0, "must be positive").into());
        }
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "store path".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// ============================================================================
// INTAKE
// ============================================================================

/// Intake pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeConfig {
    /// Budget passed to the gateway for each submission
    pub model_timeout: Duration,
    /// Capacity of the chunk channel for streaming submissions
    pub stream_buffer: usize,
    pub default_list_limit: usize,
    pub max_list_limit: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            model_timeout: Duration::from_secs(600),
            stream_buffer: 64,
            default_list_limit: 20,
            max_list_limit: 500,
        }
    }
}

impl IntakeConfig {
    /// Environment variables:
    /// - `COPILOT_MODEL_TIMEOUT_SECS`: per-submission model budget (default: 600)
    /// - `COPILOT_STREAM_BUFFER`: chunk channel capacity (default: 64)
    /// - `COPILOT_LIST_DEFAULT_LIMIT` / `COPILOT_LIST_MAX_LIMIT` (default: 20 / 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model_timeout: env_parse(&["COPILOT_MODEL_TIMEOUT_SECS"])
                .map(Duration::from_secs)
                .unwrap_or(defaults.model_timeout),
            stream_buffer: env_parse(&["COPILOT_STREAM_BUFFER"]).unwrap_or(defaults.stream_buffer),
            default_list_limit: env_parse(&["COPILOT_LIST_DEFAULT_LIMIT"])
                .unwrap_or(defaults.default_list_limit),
            max_list_limit: env_parse(&["COPILOT_LIST_MAX_LIMIT"])
                .unwrap_or(defaults.max_list_limit),
        }
    }

    pub fn validate(&self) -> CopilotResult<()> {
        if self.model_timeout.is_zero() {
            return Err(invalid("model_timeout", "0", "must be positive").into());
        }
        if self.stream_buffer == 0 {
            return Err(invalid("stream_buffer", 0, "must be positive").into());
        }
        if self.default_list_limit == 0 || self.default_list_limit > self.max_list_limit {
            return Err(invalid(
                "default_list_limit",
                self.default_list_limit,
                "must be between 1 and max_list_limit",
            )
            .into());
        }
        Ok(())
    }
}
