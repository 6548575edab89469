//! Error types for the bandit recommender core
//!
//! This module provides error handling using thiserror for structured error
//! definitions and anyhow for propagation at the binary edge.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for recommender operations
#[derive(Error, Debug)]
pub enum BanditError {
    /// A context vector or persisted matrix does not match the bank dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Caller supplied inconsistent or non-finite input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Model file could not be written or the persistence worker is gone
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for recommender operations
pub type Result<T> = std::result::Result<T, BanditError>;

/// Convert anyhow::Error to BanditError
impl From<anyhow::Error> for BanditError {
    fn from(err: anyhow::Error) -> Self {
        BanditError::Other(err.to_string())
    }
}
