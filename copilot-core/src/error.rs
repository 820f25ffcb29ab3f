//! Error types for copilot operations

use thiserror::Error;

/// Language-model backend errors.
///
/// Recoverable inside the intake pipeline: every variant is turned
/// into a degraded response rather than surfaced to the caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Model backend unavailable via {transport}: {reason}")]
    Unavailable { transport: String, reason: String },

    #[error("Model call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Invalid response from {transport}: {reason}")]
    InvalidResponse { transport: String, reason: String },
}

impl ModelError {
    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(transport: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            transport: transport.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is the timeout class.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ModelError::Timeout { .. })
    }
}

/// Persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: u64, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

impl StorageError {
    /// Shorthand for an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Category file {path} unreadable: {reason}")]
    CategoriesUnreadable { path: String, reason: String },

    #[error("Category {category} uses unknown placeholder {{{{{placeholder}}}}}")]
    UnknownPlaceholder {
        category: String,
        placeholder: String,
    },
}

/// Master error type for all copilot errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CopilotError {
    #[error("Unknown category '{category}' (known: {})", .known.join(", "))]
    UnknownCategory { category: String, known: Vec<String> },

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for copilot operations.
pub type CopilotResult<T> = Result<T, CopilotError>;
