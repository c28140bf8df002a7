//! Error types for Outlook RAG
//!
//! Provides a single error enum shared by every crate with:
//! - Distinct variants for each pipeline failure mode
//! - Machine-readable error codes
//! - A retryability hint so callers can decide on their own retry policy

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,

    // Input errors (2xxx)
    ExtractionError,

    // Corpus errors (4xxx)
    SnapshotError,
    DimensionMismatch,
    MissingEmbedding,

    // External service errors (8xxx)
    UpstreamError,
    EmbeddingError,
    SynthesisError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,

            ErrorCode::ExtractionError => 2001,

            ErrorCode::SnapshotError => 4001,
            ErrorCode::DimensionMismatch => 4002,
            ErrorCode::MissingEmbedding => 4003,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::EmbeddingError => 8002,
            ErrorCode::SynthesisError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Page input could not be read; nothing downstream can recover from this
    #[error("Extraction failed for {source_path}: {message}")]
    Extraction { source_path: String, message: String },

    #[error("Snapshot error for {path}: {message}")]
    Snapshot { path: String, message: String },

    #[error("Embedding dimension mismatch: expected {expected}, found {found} (chunk {chunk_id})")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        chunk_id: usize,
    },

    #[error("Chunk {chunk_id} has no embedding; build embeddings before searching")]
    MissingEmbedding { chunk_id: usize },

    #[error("Embedding service error: {message}")]
    EmbeddingError { message: String },

    #[error("Synthesis error: {message}")]
    Synthesis { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::Extraction { .. } => ErrorCode::ExtractionError,
            AppError::Snapshot { .. } => ErrorCode::SnapshotError,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::MissingEmbedding { .. } => ErrorCode::MissingEmbedding,
            AppError::EmbeddingError { .. } => ErrorCode::EmbeddingError,
            AppError::Synthesis { .. } => ErrorCode::SynthesisError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } | AppError::Io(_) | AppError::Other(_) => {
                ErrorCode::InternalError
            }
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether the failure came from a remote service and may succeed on a later attempt.
    /// The pipeline itself never retries; this only informs the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::EmbeddingError { .. } | AppError::Synthesis { .. } | AppError::HttpClient(_)
        )
    }

    pub fn validation(message: impl Into<String>, field: Option<&str>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: field.map(str::to_string),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        AppError::EmbeddingError {
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation {
            message: err.to_string(),
            field: None,
        }
    }
}
