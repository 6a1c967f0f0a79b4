//! Error types for the classification and anonymization pipeline

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while classifying values or talking to the engine
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The vector index has nothing to search
    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    /// The embedding provider could not produce a usable vector
    #[error("Embedding failure: {0}")]
    EmbeddingFailure(String),

    /// A categorical feature value the encoder was never fitted on
    #[error("Unseen category '{value}' for feature '{feature}'")]
    UnseenCategory {
        feature: String,
        value: String,
    },

    /// The anonymization engine ran past its deadline
    #[error("Anonymization engine timed out after {0:?}")]
    SubprocessTimeout(Duration),

    /// The anonymization engine could not be started or exited non-zero
    #[error("Anonymization engine failed ({status}): {stderr}")]
    SubprocessFailure {
        status: String,
        stderr: String,
    },

    /// The engine's output file was missing, empty, or unreadable
    #[error("Anonymization engine protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// Missing or invalid artifacts and settings; fatal at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested data source does not exist or cannot be read
    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable snake_case name used when rendering a failure
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::IndexUnavailable(_) => "index_unavailable",
            PipelineError::EmbeddingFailure(_) => "embedding_failure",
            PipelineError::UnseenCategory { .. } => "unseen_category",
            PipelineError::SubprocessTimeout(_) => "subprocess_timeout",
            PipelineError::SubprocessFailure { .. } => "subprocess_failure",
            PipelineError::ProtocolMismatch(_) => "protocol_mismatch",
            PipelineError::Configuration(_) => "configuration_error",
            PipelineError::SourceUnavailable(_) => "source_unavailable",
            PipelineError::Io(_) => "io_error",
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
