//! Error types for the cash horizon analysis engine

use crate::models::TaskErrorKind;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// Malformed or missing transaction / company fields. Surfaced, never retried.
    #[error("Data error: {0}")]
    DataError(String),

    /// The Summarize collaborator failed.
    #[error("Collaborator error: {0}")]
    CollaboratorError(String),

    #[error("Collaborator timed out after {0}s")]
    CollaboratorTimeout(u64),

    /// Invalid policy, task kind or settings. Aborts a run before any task starts.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Coarse classification stored in failed task outcomes.
    pub fn kind(&self) -> TaskErrorKind {
        match self {
            OrchestrationError::DataError(_) => TaskErrorKind::Data,
            OrchestrationError::CollaboratorError(_) | OrchestrationError::HttpError(_) => {
                TaskErrorKind::Collaborator
            }
            OrchestrationError::CollaboratorTimeout(_) => TaskErrorKind::Timeout,
            OrchestrationError::ConfigurationError(_) => TaskErrorKind::Configuration,
            OrchestrationError::Cancelled(_) => TaskErrorKind::Cancelled,
            OrchestrationError::TaskPanicked(_)
            | OrchestrationError::SerializationError(_)
            | OrchestrationError::IoError(_) => TaskErrorKind::Internal,
        }
    }

    /// Errors that abort a whole run instead of degrading a single task.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrchestrationError::DataError(_) | OrchestrationError::ConfigurationError(_)
        )
    }
}
