use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Properties;
use crate::keys;

/// Type assigned to entities ingested without one.
pub const DEFAULT_ENTITY_TYPE: &str = "entity";

/// A node of the knowledge graph, unique per tenant by `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: String,
    pub name: String,
    pub entity_type: String,
    pub confidence: f64,
    #[serde(default)]
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Build an entity whose key is derived from `name`.
    pub fn new(name: &str, entity_type: Option<&str>, confidence: f64) -> Self {
        Self {
            key: keys::entity_key(name),
            name: name.trim().to_string(),
            entity_type: entity_type
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_ENTITY_TYPE)
                .to_string(),
            confidence,
            properties: Properties::new(),
            created_at: Utc::now(),
        }
    }

    /// Fold another occurrence of the same entity into this one.
    ///
    /// The first name and first explicit type win; confidence keeps the max;
    /// properties are unioned with existing values taking precedence.
    pub fn absorb(&mut self, other: &Entity) {
        debug_assert_eq!(self.key, other.key);
        if self.entity_type == DEFAULT_ENTITY_TYPE && other.entity_type != DEFAULT_ENTITY_TYPE {
            self.entity_type = other.entity_type.clone();
        }
        self.confidence = self.confidence.max(other.confidence);
        for (k, v) in &other.properties {
            self.properties.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }
}

/// Manual edit of an existing entity. `None` fields are left untouched.
///
/// The key never changes: renaming keeps the record addressable by the key
/// it was ingested under.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub entity_type: Option<String>,
    pub confidence: Option<f64>,
    pub properties: Option<Properties>,
}

impl EntityPatch {
    pub fn apply(&self, entity: &mut Entity) {
        if let Some(name) = &self.name {
            entity.name = name.trim().to_string();
        }
        if let Some(entity_type) = &self.entity_type {
            entity.entity_type = entity_type.clone();
        }
        if let Some(confidence) = self.confidence {
            entity.confidence = confidence;
        }
        if let Some(properties) = &self.properties {
            entity.properties = properties.clone();
        }
    }
}
