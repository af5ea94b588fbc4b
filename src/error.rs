//! Error types for ralphr
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in ralphr
#[derive(Debug, Error)]
pub enum RalphrError {
    /// Prompt file missing or unreadable
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Failed to spawn or drive the agent process
    #[error("Agent process error: {0}")]
    Agent(String),

    /// Activity log persistence error
    #[error("Activity log error: {0}")]
    Activity(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for ralphr operations
pub type Result<T> = std::result::Result<T, RalphrError>;
