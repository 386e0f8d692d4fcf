use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Properties;

/// A directed edge between two entity keys, scoped to one `graph_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub key: String,
    pub from: String,
    pub to: String,
    pub predicate: String,
    pub confidence: f64,
    pub graph_id: String,
    pub inferred: bool,
    #[serde(default)]
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

impl Relation {
    /// Fold a duplicate of this relation (same key) into it.
    pub fn absorb(&mut self, other: &Relation) {
        debug_assert_eq!(self.key, other.key);
        self.confidence = self.confidence.max(other.confidence);
        self.inferred = self.inferred && other.inferred;
        for (k, v) in &other.properties {
            self.properties.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

/// Manual edit of an existing relation. Endpoints and predicate are part of
/// the identity and cannot be patched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationPatch {
    pub confidence: Option<f64>,
    pub inferred: Option<bool>,
    pub properties: Option<Properties>,
}

impl RelationPatch {
    pub fn apply(&self, relation: &mut Relation) {
        if let Some(confidence) = self.confidence {
            relation.confidence = confidence;
        }
        if let Some(inferred) = self.inferred {
            relation.inferred = inferred;
        }
        if let Some(properties) = &self.properties {
            relation.properties = properties.clone();
        }
    }
}
