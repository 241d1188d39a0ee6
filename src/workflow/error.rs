//! Workflow error types.

use thiserror::Error;

use super::model::SessionStatus;
use super::phase::Phase;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur while tracking workflow sessions.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No session with this id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No task with this id in the session.
    #[error("Task '{task_id}' not found in session '{session_id}'")]
    TaskNotFound { session_id: String, task_id: String },

    /// Phase transition rejected.
    #[error("Cannot transition session '{session_id}' to {to}: {reason}")]
    InvalidTransition { session_id: String, to: Phase, reason: String },

    /// Status operation attempted from an incompatible status.
    #[error("Cannot {operation} session '{session_id}' while it is {status}")]
    InvalidStateTransition { session_id: String, operation: &'static str, status: SessionStatus },

    /// Rejected caller input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing the state file failed.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Whether this error means an id did not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound(_) | Self::TaskNotFound { .. })
    }

    /// Whether this error came from the state file rather than the caller.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Json(_))
    }
}
