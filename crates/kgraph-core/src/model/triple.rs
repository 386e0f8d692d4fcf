use serde::{Deserialize, Serialize};

use super::Properties;

/// A fact as supplied by the upstream extraction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTriple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub subject_type: Option<String>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub inferred: Option<bool>,
    #[serde(default)]
    pub properties: Option<Properties>,
}

impl RawTriple {
    pub fn new(subject: &str, predicate: &str, object: &str) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            confidence: None,
            subject_type: None,
            object_type: None,
            inferred: None,
            properties: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_types(mut self, subject_type: &str, object_type: &str) -> Self {
        self.subject_type = Some(subject_type.to_string());
        self.object_type = Some(object_type.to_string());
        self
    }

    pub fn inferred(mut self) -> Self {
        self.inferred = Some(true);
        self
    }
}

/// A stored relation with both endpoints resolved back to entity names.
///
/// This is the plain, JSON-serialisable shape every read path returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripleRecord {
    pub key: String,
    pub graph_id: String,
    pub subject_key: String,
    pub subject: String,
    pub subject_type: String,
    pub predicate: String,
    pub object_key: String,
    pub object: String,
    pub object_type: String,
    pub confidence: f64,
    pub inferred: bool,
    #[serde(default)]
    pub properties: Properties,
}
