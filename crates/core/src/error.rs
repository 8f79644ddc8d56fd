//! Error types for the labor-law answering pipeline.
//!
//! Only two failure categories ever reach a caller of the pipeline:
//! `InvalidInput` and `RetrievalUnavailable`. Routing and synthesis failures
//! are recovered inside their stage and surface as fallback reasons instead.

use thiserror::Error;

/// Unified error type for the workspace.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, HTTP status, unparsable body)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Catalog, embedding and retrieval plumbing errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Rejected before any external call (e.g. an empty query)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every targeted collection failed, or the query could not be embedded
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Machine-readable code for the error category.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Io(_) => "io_error",
            AppError::Llm(_) => "llm_error",
            AppError::Knowledge(_) => "knowledge_error",
            AppError::Prompt(_) => "prompt_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::RetrievalUnavailable(_) => "retrieval_unavailable",
            AppError::Serialization(_) => "serialization_error",
            AppError::Other(_) => "error",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
