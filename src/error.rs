//! Error types for the embedding store
//!
//! A single `thiserror` enum covers the vector math, the quantizer, the
//! SQLite-backed tables and the text-level collection. Messages carry a
//! suggestion line so callers can surface them directly.

use thiserror::Error;

/// Errors that can occur while storing or searching vectors.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors in a category use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error(
        "Cosine similarity is undefined for a zero-magnitude vector\nSuggestion: Check that the embedder did not return an all-zero vector"
    )]
    ZeroMagnitude,

    #[error(
        "Vector component {index} is not finite ({value})\nSuggestion: Reject NaN and infinite values before storing or searching"
    )]
    NonFiniteValue { index: usize, value: f32 },

    #[error("Failed to create schema for '{table}': {cause}")]
    SchemaError { table: String, cause: String },

    #[error("Store operation '{operation}' failed: {cause}")]
    StoreError { operation: String, cause: String },

    #[error("Vector not found: ID {0}\nSuggestion: Verify the vector was stored in the active category")]
    NotFound(i64),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error(
        "Embedding generation failed: {0}\nSuggestion: Verify the embedding model is properly initialized"
    )]
    EmbeddingFailed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl VectorError {
    /// Wraps a failure from the relational store with the operation that hit it.
    pub fn store(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::StoreError {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Wraps a failure raised while creating or dropping a table.
    pub fn schema(table: &str, cause: impl std::fmt::Display) -> Self {
        Self::SchemaError {
            table: table.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used for programmatic
    /// error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::InvalidDimension { .. } => "INVALID_DIMENSION",
            Self::ZeroMagnitude => "ZERO_MAGNITUDE",
            Self::NonFiniteValue { .. } => "NON_FINITE_VALUE",
            Self::SchemaError { .. } => "SCHEMA_ERROR",
            Self::StoreError { .. } => "STORE_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::EmbeddingFailed(_) => "EMBEDDING_FAILED",
            Self::Config(_) => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::DimensionMismatch { .. } => vec![
                "Recreate the category with the embedder's dimension",
                "Check the category.dimension override in settings.toml",
            ],
            Self::SchemaError { .. } => vec![
                "The schema change was rolled back, the database is unchanged",
                "Check that the database file is writable",
            ],
            Self::StoreError { .. } => vec![
                "The operation was not retried; repeat it if the cause was transient",
                "Increase database.busy_timeout_ms if the database was locked",
            ],
            Self::NotFound(_) => vec![
                "Search the category to find the current ids",
                "Ids are never reused after deletion",
            ],
            Self::EmbeddingFailed(_) => vec![
                "Ensure you have internet connection for first-time model download",
                "Check embedding.cache_dir permissions",
            ],
            _ => vec![],
        }
    }
}

pub type VectorResult<T> = Result<T, VectorError>;
