//! Records persisted in a tenant partition, plus the raw and resolved triple
//! shapes that cross the crate boundary.

mod entity;
mod relation;
mod status;
mod triple;

pub use entity::{Entity, EntityPatch, DEFAULT_ENTITY_TYPE};
pub use relation::{Relation, RelationPatch};
pub use status::GraphStatus;
pub use triple::{RawTriple, TripleRecord};

/// Free-form record properties, kept as a JSON object.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Whether a confidence value lies in `[0, 1]` and is finite.
pub fn is_valid_confidence(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
