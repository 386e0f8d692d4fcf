//! Centralized error types for KGraph.

use std::time::Duration;

use thiserror::Error;

/// Main error type for KGraph operations.
#[derive(Error, Debug)]
pub enum KgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Graph backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Analytics unavailable: {0}")]
    AnalyticsUnavailable(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for KGraph operations.
pub type KgResult<T> = Result<T, KgError>;

impl KgError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a backend-unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create a query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error must terminate the request instead of being folded
    /// into a result envelope.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::BackendUnavailable(_))
    }
}
