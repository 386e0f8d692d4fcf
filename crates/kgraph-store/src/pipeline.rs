//! Raw triples to canonical records, then batched upserts.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kgraph_core::{
    is_valid_confidence, keys, Entity, KgResult, PartitionHandle, Properties, RawTriple, Relation,
};

use crate::adapter::{GraphBackendAdapter, ItemFailure};
use crate::envelope::IngestionFailure;

/// How relation keys are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKeyStrategy {
    /// Hash of `(from, predicate, to)`: re-ingesting a fact overwrites it.
    #[default]
    ContentHash,
    /// `graph_id:n` by position: every ingestion appends.
    Ordinal,
}

/// A validated, de-duplicated batch ready for the adapter.
#[derive(Debug, Default)]
pub struct PreparedBatch {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    /// Triples rejected before reaching the backend.
    pub failures: Vec<IngestionFailure>,
    entity_sources: HashMap<String, Vec<usize>>,
    relation_sources: HashMap<String, Vec<usize>>,
}

impl PreparedBatch {
    /// Input indices that produced the record with `key`.
    pub fn sources_of(&self, key: &str) -> &[usize] {
        self.entity_sources
            .get(key)
            .or_else(|| self.relation_sources.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// What one ingestion wrote and what it could not.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionOutcome {
    pub entities_inserted: usize,
    pub relations_inserted: usize,
    pub failures: Vec<IngestionFailure>,
}

#[derive(Debug, Clone)]
pub struct TripleIngestionPipeline {
    batch_size: usize,
    key_strategy: RelationKeyStrategy,
}

impl TripleIngestionPipeline {
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size: batch_size.max(1), key_strategy: RelationKeyStrategy::default() }
    }

    pub fn with_key_strategy(mut self, key_strategy: RelationKeyStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    pub fn key_strategy(&self) -> RelationKeyStrategy {
        self.key_strategy
    }

    /// Validate and canonicalise `triples`.
    ///
    /// `ordinal_base` is the first position used by [`RelationKeyStrategy::Ordinal`]
    /// and is ignored otherwise.
    pub fn prepare(
        &self,
        graph_id: &str,
        triples: &[RawTriple],
        ordinal_base: usize,
    ) -> PreparedBatch {
        let mut batch = PreparedBatch::default();
        let mut entity_pos: HashMap<String, usize> = HashMap::new();
        let mut relation_pos: HashMap<String, usize> = HashMap::new();
        let mut ordinal = ordinal_base;

        for (index, raw) in triples.iter().enumerate() {
            let rejected = validate(index, raw);
            if !rejected.is_empty() {
                batch.failures.extend(rejected);
                continue;
            }
            let confidence = raw.confidence.unwrap_or(1.0);

            let subject = Entity::new(&raw.subject, raw.subject_type.as_deref(), confidence);
            let object = Entity::new(&raw.object, raw.object_type.as_deref(), confidence);
            let (from, to) = (subject.key.clone(), object.key.clone());
            for entity in [subject, object] {
                let sources = batch.entity_sources.entry(entity.key.clone()).or_default();
                if sources.last() != Some(&index) {
                    sources.push(index);
                }
                match entity_pos.get(&entity.key) {
                    Some(&pos) => batch.entities[pos].absorb(&entity),
                    None => {
                        entity_pos.insert(entity.key.clone(), batch.entities.len());
                        batch.entities.push(entity);
                    }
                }
            }

            let key = match self.key_strategy {
                RelationKeyStrategy::ContentHash => keys::relation_key(&from, &raw.predicate, &to),
                RelationKeyStrategy::Ordinal => {
                    ordinal += 1;
                    keys::ordinal_relation_key(graph_id, ordinal - 1)
                }
            };
            let relation = Relation {
                key,
                from,
                to,
                predicate: raw.predicate.trim().to_string(),
                confidence,
                graph_id: graph_id.to_string(),
                inferred: raw.inferred.unwrap_or(false),
                properties: raw.properties.clone().unwrap_or_else(Properties::new),
                created_at: Utc::now(),
            };
            batch.relation_sources.entry(relation.key.clone()).or_default().push(index);
            match relation_pos.get(&relation.key) {
                Some(&pos) => batch.relations[pos].absorb(&relation),
                None => {
                    relation_pos.insert(relation.key.clone(), batch.relations.len());
                    batch.relations.push(relation);
                }
            }
        }

        debug!(
            graph_id,
            input = triples.len(),
            entities = batch.entities.len(),
            relations = batch.relations.len(),
            rejected = batch.failures.len(),
            "Prepared triple batch"
        );
        batch
    }

    /// Prepare `triples` and write them: all entities first, then the
    /// relations whose endpoints were stored.
    ///
    /// Item failures and non-fatal chunk failures are reported in the
    /// outcome; fatal errors abort the ingestion.
    pub async fn ingest(
        &self,
        adapter: &dyn GraphBackendAdapter,
        partition: &PartitionHandle,
        graph_id: &str,
        triples: &[RawTriple],
        ordinal_base: usize,
    ) -> KgResult<IngestionOutcome> {
        let batch = self.prepare(graph_id, triples, ordinal_base);
        let mut outcome =
            IngestionOutcome { failures: batch.failures.clone(), ..Default::default() };

        let mut failed_entities: HashSet<String> = HashSet::new();
        for chunk in batch.entities.chunks(self.batch_size) {
            let rejected = match adapter.upsert_entities(partition, chunk).await {
                Ok(rejected) => rejected,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => chunk.iter().map(|en| ItemFailure::new(&en.key, e.to_string())).collect(),
            };
            outcome.entities_inserted += chunk.len() - rejected.len();
            for failure in rejected {
                let name = chunk
                    .iter()
                    .find(|en| en.key == failure.key)
                    .map(|en| en.name.as_str())
                    .unwrap_or(failure.key.as_str());
                for &index in batch.sources_of(&failure.key) {
                    outcome.failures.push(IngestionFailure::new(
                        index,
                        None,
                        format!("entity '{name}' not stored: {}", failure.reason),
                    ));
                }
                failed_entities.insert(failure.key);
            }
        }

        let relations: Vec<Relation> = batch
            .relations
            .iter()
            .filter(|r| !failed_entities.contains(&r.from) && !failed_entities.contains(&r.to))
            .cloned()
            .collect();

        for chunk in relations.chunks(self.batch_size) {
            let rejected = match adapter.upsert_relations(partition, chunk).await {
                Ok(rejected) => rejected,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => chunk.iter().map(|r| ItemFailure::new(&r.key, e.to_string())).collect(),
            };
            outcome.relations_inserted += chunk.len() - rejected.len();
            for failure in rejected {
                for &index in batch.sources_of(&failure.key) {
                    outcome.failures.push(IngestionFailure::new(
                        index,
                        Some("predicate"),
                        format!("relation not stored: {}", failure.reason),
                    ));
                }
            }
        }

        if !outcome.failures.is_empty() {
            warn!(
                tenant_id = %partition.tenant_id,
                graph_id,
                failed = outcome.failures.len(),
                "Ingestion finished with item failures"
            );
        }
        info!(
            tenant_id = %partition.tenant_id,
            graph_id,
            entities = outcome.entities_inserted,
            relations = outcome.relations_inserted,
            "Ingested triples"
        );
        Ok(outcome)
    }
}

/// One failure per offending field; an empty result means the triple is valid.
fn validate(index: usize, raw: &RawTriple) -> Vec<IngestionFailure> {
    let mut failures = Vec::new();
    let required =
        [("subject", &raw.subject), ("predicate", &raw.predicate), ("object", &raw.object)];
    for (field, value) in required {
        if value.trim().is_empty() {
            let reason = format!("{field} must not be empty");
            failures.push(IngestionFailure::new(index, Some(field), reason));
        }
    }
    if let Some(confidence) = raw.confidence {
        if !is_valid_confidence(confidence) {
            failures.push(IngestionFailure::new(
                index,
                Some("confidence"),
                format!("confidence {confidence} is outside [0, 1]"),
            ));
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> TripleIngestionPipeline {
        TripleIngestionPipeline::new(100)
    }

    #[test]
    fn entities_are_deduplicated_within_a_batch() {
        let triples = vec![
            RawTriple::new("Alice", "works_at", "Acme").with_confidence(0.5),
            RawTriple::new("alice", "knows", "Bob").with_types("person", "person"),
            RawTriple::new("ACME", "employs", "Bob"),
        ];
        let batch = pipeline().prepare("g", &triples, 0);
        assert_eq!(batch.entities.len(), 3);
        assert_eq!(batch.relations.len(), 3);

        let alice = &batch.entities[0];
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.entity_type, "person");
        assert_eq!(alice.confidence, 1.0);
        assert_eq!(batch.sources_of(&alice.key), &[0, 1]);
    }

    #[test]
    fn duplicate_facts_merge_into_one_relation() {
        let triples = vec![
            RawTriple::new("A", "likes", "B").with_confidence(0.3).inferred(),
            RawTriple::new("a", "LIKES", "b").with_confidence(0.7),
        ];
        let batch = pipeline().prepare("g", &triples, 0);
        assert_eq!(batch.relations.len(), 1);
        let r = &batch.relations[0];
        assert_eq!(r.confidence, 0.7);
        assert!(!r.inferred);
        assert_eq!(r.predicate, "likes");
        assert_eq!(batch.sources_of(&r.key), &[0, 1]);
    }

    #[test]
    fn invalid_triples_are_itemised() {
        let triples = vec![
            RawTriple::new("A", "p", "B"),
            RawTriple::new(" ", "p", ""),
            RawTriple::new("A", "p", "C").with_confidence(1.5),
            RawTriple::new("A", "p", "D").with_confidence(f64::NAN),
        ];
        let batch = pipeline().prepare("g", &triples, 0);
        assert_eq!(batch.relations.len(), 1);

        let fields: Vec<(usize, Option<&str>)> =
            batch.failures.iter().map(|f| (f.index, f.field.as_deref())).collect();
        assert_eq!(
            fields,
            vec![
                (1, Some("subject")),
                (1, Some("object")),
                (2, Some("confidence")),
                (3, Some("confidence")),
            ]
        );
    }

    #[test]
    fn defaults_fill_missing_confidence_and_type() {
        let batch = pipeline().prepare("g", &[RawTriple::new("A", "p", "B")], 0);
        assert_eq!(batch.relations[0].confidence, 1.0);
        assert_eq!(batch.entities[1].entity_type, "entity");
    }

    #[test]
    fn ordinal_keys_continue_from_base() {
        let triples = vec![RawTriple::new("A", "p", "B"), RawTriple::new("A", "p", "B")];
        let batch =
            pipeline().with_key_strategy(RelationKeyStrategy::Ordinal).prepare("g", &triples, 5);
        let keys: Vec<&str> = batch.relations.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["g:5", "g:6"]);
    }

    #[test]
    fn content_keys_do_not_depend_on_graph() {
        let t = [RawTriple::new("A", "p", "B")];
        let a = pipeline().prepare("g1", &t, 0);
        let b = pipeline().prepare("g2", &t, 0);
        assert_eq!(a.relations[0].key, b.relations[0].key);
    }
}
