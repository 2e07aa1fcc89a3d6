//! Error types for the scenario intelligence engine

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, ScenarioError>;

#[derive(Error, Debug)]
pub enum ScenarioError {

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Node '{phase}' failed: {message}")]
    NodeExecution { phase: String, message: String },

    #[error("Pipeline timed out after {0} ms")]
    Timeout(u64),

    #[error("Insight collaborator error: {0}")]
    Collaborator(String),

    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Pipeline not found: {0}")]
    PipelineNotFound(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Run {0} was cancelled")]
    Cancelled(Uuid),

    #[error("Pipeline task failed: {0}")]
    TaskJoin(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ScenarioError {
    /// Shorthand used by nodes to report a failure in their own phase
    pub fn node(phase: impl Into<String>, message: impl Into<String>) -> Self {
        ScenarioError::NodeExecution {
            phase: phase.into(),
            message: message.into(),
        }
    }
}
