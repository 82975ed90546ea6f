//! Unified error types for Slated

use thiserror::Error;

/// Unified error type for all Slated operations
#[derive(Error, Debug)]
pub enum SlatedError {
    // Admission errors
    #[error("{0}")]
    Validation(String),

    // Remote agent service errors
    #[error("upstream request failed after retries: {0}")]
    UpstreamTransient(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("model output could not be parsed: {0}")]
    Parse(String),

    // Pipeline errors
    #[error("pipeline failure: {0}")]
    Pipeline(String),

    #[error("render error: {0}")]
    Render(String),

    // Provisioning errors
    #[error("provisioning error: {0}")]
    Provision(String),

    // Lookup errors
    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using SlatedError
pub type Result<T> = std::result::Result<T, SlatedError>;
