//! Visualization errors.

use thiserror::Error;

use kgraph_core::KgError;

#[derive(Error, Debug)]
pub enum VizError {
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] KgError),
}

impl VizError {
    /// Whether the underlying storage error should end the request.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Graph(e) if e.is_fatal())
    }
}

pub type VizResult<T> = Result<T, VizError>;
