//! Plain, JSON-serialisable results handed to the API layer.
//!
//! Only fatal errors (`Config`, `BackendUnavailable`) escape as `Err`; every
//! other failure is reported inside these envelopes.

use serde::{Deserialize, Serialize};
use tracing::warn;

use kgraph_core::{KgResult, TripleRecord};

/// Generic `{success, data | error}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }

    /// Fold a result into an envelope, letting fatal errors through.
    pub fn from_result(result: KgResult<T>) -> KgResult<Self> {
        match result {
            Ok(data) => Ok(Self::ok(data)),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Operation failed");
                Ok(Self::failed(e.to_string()))
            }
        }
    }

    /// The payload of a successful envelope.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Why one input triple (or one of its fields) was not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionFailure {
    /// Position of the triple in the submitted batch.
    pub index: usize,
    /// Offending field (`subject`, `predicate`, `object`, `confidence`), if
    /// the failure is attributable to one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub reason: String,
}

impl IngestionFailure {
    pub fn new(index: usize, field: Option<&str>, reason: impl Into<String>) -> Self {
        Self { index, field: field.map(str::to_string), reason: reason.into() }
    }
}

/// Outcome of `save_knowledge_graph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveReport {
    pub success: bool,
    pub graph_id: String,
    pub entities_inserted: usize,
    pub relations_inserted: usize,
    pub errors: Vec<IngestionFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveReport {
    pub fn failed(graph_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            graph_id: graph_id.to_string(),
            entities_inserted: 0,
            relations_inserted: 0,
            errors: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Indices of triples worth resubmitting.
    pub fn failed_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.errors.iter().map(|f| f.index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

/// Outcome of `load_knowledge_graph`. A missing graph is an empty success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadResult {
    pub success: bool,
    pub graph_id: String,
    pub triples: Vec<TripleRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of `delete_knowledge_graph`. Deleting a missing graph reports
/// `success = false` and changes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
    pub graph_id: String,
    pub relations_deleted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
