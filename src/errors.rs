//! Error types for fusionrag
//!
//! Every component boundary returns [`Result`]. The orchestrator decides
//! per variant whether a failure ends the request or only degrades it.

use thiserror::Error;

/// Main error type for the RAG pipeline
#[derive(Error, Debug)]
pub enum RagError {
    /// Bad weights, missing keys, unsupported providers (fatal at startup)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Index unreachable, embedding failed or empty corpus (fatal per request)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Structured grader output could not be obtained or parsed (recoverable)
    #[error("Grading error: {0}")]
    Grading(String),

    /// Answer generation call failed (fatal per request)
    #[error("Generation error: {0}")]
    Generation(String),

    /// Rejected before any stage ran
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Raw provider failure, re-tagged by the calling component
    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    /// Document loading or splitting failed
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Re-tag any failure as a retrieval failure
    pub fn into_retrieval(self) -> Self {
        match self {
            RagError::Retrieval(_) | RagError::Configuration(_) => self,
            other => RagError::Retrieval(other.to_string()),
        }
    }

    /// Re-tag any failure as a grading failure
    pub fn into_grading(self) -> Self {
        match self {
            RagError::Grading(_) => self,
            other => RagError::Grading(other.to_string()),
        }
    }

    /// Re-tag any failure as a generation failure
    pub fn into_generation(self) -> Self {
        match self {
            RagError::Generation(_) => self,
            other => RagError::Generation(other.to_string()),
        }
    }
}
