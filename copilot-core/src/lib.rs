//! Copilot Core - Entity Types
//!
//! Data structures shared by every other crate: incident reports, category
//! templates, the structured response schema, persisted records, errors,
//! configuration and health types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod category;
pub mod config;
pub mod error;
pub mod health;

pub use category::{CategorySet, CategoryTemplate};
pub use config::{GatewayConfig, IntakeConfig, StoreConfig};
pub use error::{ConfigError, CopilotError, CopilotResult, ModelError, StorageError};
pub use health::{HealthCheck, HealthStatus};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Auto-incrementing record identifier; the primary ordering key of the store.
pub type IncidentId = u64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// ENUMS
// ============================================================================

/// Severity assigned by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
    #[default]
    Unknown,
}

impl Severity {
    /// Lenient conversion from model text. Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
            Severity::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the caller wants the model output delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// Single text blob once the model finishes
    #[default]
    Blocking,
    /// Text chunks forwarded as they arrive
    Streaming,
}

/// Terminal outcome of one intake pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Model output yielded a structured object
    #[default]
    Parsed,
    /// Model answered but no structured object was recoverable
    Degraded,
    /// Model unreachable or timed out after fallback
    ModelFailed,
    /// Caller went away before the model finished
    Cancelled,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Parsed => "parsed",
            Disposition::Degraded => "degraded",
            Disposition::ModelFailed => "model_failed",
            Disposition::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// INPUT
// ============================================================================

/// A raw incident report from an agent or an operator. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IncidentReport {
    pub category: String,
    /// Free text; not validated.
    pub agent_identifier: String,
    /// May be empty.
    pub raw_text: String,
}

impl IncidentReport {
    pub fn new(
        category: impl Into<String>,
        agent_identifier: impl Into<String>,
        raw_text: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            agent_identifier: agent_identifier.into(),
            raw_text: raw_text.into(),
        }
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// Label used when the model gave no usable recommendation.
pub const FALLBACK_ACTION: &str = "investigate";

/// Fixed-schema remediation suggestion. Every field is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct StructuredResponse {
    /// Advisory only
    pub investigation_steps: Vec<String>,
    /// Advisory only, never executed
    pub commands: Vec<String>,
    pub fixes: Vec<String>,
    pub severity: Severity,
    pub recommended_action: String,
    pub notes: String,
}

impl StructuredResponse {
    /// Shape used when no structured object could be recovered from model text.
    /// The raw text is kept in `notes` so it is never discarded.
    pub fn degraded(raw: impl Into<String>) -> Self {
        Self {
            recommended_action: FALLBACK_ACTION.to_string(),
            notes: raw.into(),
            ..Self::default()
        }
    }

    /// Synthetic response for a model that could not be reached at all.
    pub fn model_failure(reason: impl fmt::Display) -> Self {
        Self::degraded(format!(
            "Model backend failed, no AI suggestion available: {}",
            reason
        ))
    }
}

// ============================================================================
// PERSISTED RECORDS
// ============================================================================

/// Fields of a record before the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncidentRecord {
    pub timestamp: Timestamp,
    pub category: String,
    pub agent_identifier: String,
    pub incident_text: String,
    pub raw_model_text: String,
    pub structured_response: StructuredResponse,
    pub disposition: Disposition,
}

impl NewIncidentRecord {
    /// Build the record for a report, stamped with the current time.
    pub fn from_report(
        report: &IncidentReport,
        raw_model_text: impl Into<String>,
        structured_response: StructuredResponse,
        disposition: Disposition,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category: report.category.clone(),
            agent_identifier: report.agent_identifier.clone(),
            incident_text: report.raw_text.clone(),
            raw_model_text: raw_model_text.into(),
            structured_response,
            disposition,
        }
    }

    /// Attach the store-assigned id.
    pub fn with_id(self, id: IncidentId) -> IncidentRecord {
        IncidentRecord {
            id,
            timestamp: self.timestamp,
            category: self.category,
            agent_identifier: self.agent_identifier,
            incident_text: self.incident_text,
            raw_model_text: self.raw_model_text,
            structured_response: self.structured_response,
            disposition: self.disposition,
        }
    }
}

/// One persisted intake transaction. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct IncidentRecord {
    pub id: IncidentId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = DateTime))]
    pub timestamp: Timestamp,
    pub category: String,
    pub agent_identifier: String,
    pub incident_text: String,
    pub raw_model_text: String,
    pub structured_response: StructuredResponse,
    #[serde(default)]
    pub disposition: Disposition,
}
