//! The facade the API layer talks to.
//!
//! Every method resolves the tenant's partition through the active adapter,
//! runs the operation and folds non-fatal failures into a plain result.
//! Successful mutations are published as [`GraphEvent`]s.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use kgraph_core::{
    is_valid_confidence, Entity, EntityPatch, GraphStatus, KgError, KgResult, PartitionHandle,
    RawTriple,
    Relation, RelationPatch, TripleRecord,
};

use crate::adapter::{GraphBackendAdapter, GraphCounts, GraphSummary};
use crate::envelope::{DeleteResult, Envelope, LoadResult, SaveReport};
use crate::events::{EventReceiver, GraphEvent};
use crate::factory::GraphDatabaseRegistry;
use crate::pipeline::{IngestionOutcome, RelationKeyStrategy, TripleIngestionPipeline};
use crate::query::{GraphQueryEngine, GraphStatistics};

/// Processing state of one `(tenant, graph_id)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphProcessingState {
    pub status: GraphStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the graph was first seen by this store.
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

type StatusKey = (String, String);

pub struct KnowledgeGraphStore {
    registry: Arc<GraphDatabaseRegistry>,
    key_strategy: RelationKeyStrategy,
    statuses: Mutex<HashMap<StatusKey, GraphProcessingState>>,
}

impl KnowledgeGraphStore {
    pub fn new(registry: Arc<GraphDatabaseRegistry>) -> Self {
        Self {
            registry,
            key_strategy: RelationKeyStrategy::default(),
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_key_strategy(mut self, key_strategy: RelationKeyStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    pub fn registry(&self) -> &Arc<GraphDatabaseRegistry> {
        &self.registry
    }

    pub fn adapter(&self) -> Arc<dyn GraphBackendAdapter> {
        self.registry.adapter()
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.registry.subscribe()
    }

    pub async fn health_check(&self) -> KgResult<()> {
        self.adapter().health_check().await
    }

    async fn partition(
        &self,
        adapter: &dyn GraphBackendAdapter,
        tenant_id: &str,
    ) -> KgResult<PartitionHandle> {
        adapter.create_tenant_context(tenant_id).await
    }

    /// The tenant's partition if it was ever provisioned. Reads and deletes
    /// go through here so they never create a partition as a side effect.
    async fn existing_partition(
        &self,
        adapter: &dyn GraphBackendAdapter,
        tenant_id: &str,
    ) -> KgResult<Option<PartitionHandle>> {
        adapter.existing_tenant_context(tenant_id).await
    }

    /// Ingest `triples` into `graph_id`.
    ///
    /// The report succeeds when ingestion ran to completion; triples that
    /// could not be stored are listed in `errors` with their input index.
    pub async fn save_knowledge_graph(
        &self,
        tenant_id: &str,
        graph_id: &str,
        triples: &[RawTriple],
    ) -> KgResult<SaveReport> {
        if graph_id.trim().is_empty() {
            return Ok(SaveReport::failed(graph_id, "graph id must not be empty"));
        }
        self.record_created(tenant_id, graph_id);
        let adapter = self.adapter();
        let partition = match self.partition(adapter.as_ref(), tenant_id).await {
            Ok(p) => p,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Ok(SaveReport::failed(graph_id, e.to_string())),
        };

        self.transition(tenant_id, graph_id, GraphStatus::Processing, None);
        let result = self.ingest(adapter.as_ref(), &partition, graph_id, triples).await;

        match result {
            Ok(outcome) => {
                self.transition(tenant_id, graph_id, GraphStatus::Completed, None);
                self.registry.publish(GraphEvent::GraphSaved {
                    tenant_id: tenant_id.to_string(),
                    graph_id: graph_id.to_string(),
                });
                Ok(SaveReport {
                    success: true,
                    graph_id: graph_id.to_string(),
                    entities_inserted: outcome.entities_inserted,
                    relations_inserted: outcome.relations_inserted,
                    errors: outcome.failures,
                    error: None,
                })
            }
            Err(e) => {
                self.transition(tenant_id, graph_id, GraphStatus::Failed, Some(e.to_string()));
                if e.is_fatal() {
                    return Err(e);
                }
                warn!(tenant_id, graph_id, error = %e, "Ingestion failed");
                Ok(SaveReport::failed(graph_id, e.to_string()))
            }
        }
    }

    async fn ingest(
        &self,
        adapter: &dyn GraphBackendAdapter,
        partition: &PartitionHandle,
        graph_id: &str,
        triples: &[RawTriple],
    ) -> KgResult<IngestionOutcome> {
        let pipeline = TripleIngestionPipeline::new(self.registry.config().performance.batch_size)
            .with_key_strategy(self.key_strategy);
        let ordinal_base = match self.key_strategy {
            RelationKeyStrategy::Ordinal => {
                adapter.graph_counts(partition, graph_id).await?.relations
            }
            RelationKeyStrategy::ContentHash => 0,
        };
        pipeline.ingest(adapter, partition, graph_id, triples, ordinal_base).await
    }

    /// Every triple of `graph_id`. A graph that does not exist loads as an
    /// empty success.
    pub async fn load_knowledge_graph(
        &self,
        tenant_id: &str,
        graph_id: &str,
    ) -> KgResult<LoadResult> {
        let result = self.export_triples(tenant_id, graph_id).await;
        match result {
            Ok(triples) => Ok(LoadResult {
                success: true,
                graph_id: graph_id.to_string(),
                triples,
                error: None,
            }),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(LoadResult {
                success: false,
                graph_id: graph_id.to_string(),
                triples: Vec::new(),
                error: Some(e.to_string()),
            }),
        }
    }

    /// Remove every relation of `graph_id`. Entities stay, even orphaned.
    pub async fn delete_knowledge_graph(
        &self,
        tenant_id: &str,
        graph_id: &str,
    ) -> KgResult<DeleteResult> {
        let adapter = self.adapter();
        let result = async {
            match self.existing_partition(adapter.as_ref(), tenant_id).await? {
                Some(partition) => adapter.delete_graph(&partition, graph_id).await,
                None => Ok(0),
            }
        }
        .await;

        let failed = |error: String| DeleteResult {
            success: false,
            graph_id: graph_id.to_string(),
            relations_deleted: 0,
            error: Some(error),
        };
        match result {
            Ok(0) => Ok(failed(format!("graph '{graph_id}' not found"))),
            Ok(deleted) => {
                self.statuses.lock().remove(&(tenant_id.to_string(), graph_id.to_string()));
                self.registry.publish(GraphEvent::GraphDeleted {
                    tenant_id: tenant_id.to_string(),
                    graph_id: graph_id.to_string(),
                });
                info!(tenant_id, graph_id, relations = deleted, "Deleted knowledge graph");
                Ok(DeleteResult {
                    success: true,
                    graph_id: graph_id.to_string(),
                    relations_deleted: deleted,
                    error: None,
                })
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(failed(e.to_string())),
        }
    }

    /// Bounded outbound traversal from the entity named `center`.
    pub async fn subgraph(
        &self,
        tenant_id: &str,
        center: &str,
        depth: usize,
        limit: usize,
        graph_id: Option<&str>,
    ) -> KgResult<Envelope<Vec<TripleRecord>>> {
        let adapter = self.adapter();
        let result = async {
            match self.existing_partition(adapter.as_ref(), tenant_id).await? {
                Some(partition) => {
                    GraphQueryEngine::new(adapter.clone())
                        .subgraph(&partition, center, depth, limit, graph_id)
                        .await
                }
                None => Ok(Vec::new()),
            }
        }
        .await;
        Envelope::from_result(result)
    }

    pub async fn statistics(
        &self,
        tenant_id: &str,
        graph_id: &str,
    ) -> KgResult<Envelope<GraphStatistics>> {
        let adapter = self.adapter();
        let result = async {
            match self.existing_partition(adapter.as_ref(), tenant_id).await? {
                Some(partition) => {
                    GraphQueryEngine::new(adapter.clone()).statistics(&partition, graph_id).await
                }
                None => Ok(GraphStatistics::from_counts(graph_id, GraphCounts::default())),
            }
        }
        .await;
        Envelope::from_result(result)
    }

    pub async fn list_graphs(&self, tenant_id: &str) -> KgResult<Envelope<Vec<GraphSummary>>> {
        let adapter = self.adapter();
        let result = async {
            match self.existing_partition(adapter.as_ref(), tenant_id).await? {
                Some(partition) => adapter.list_graphs(&partition).await,
                None => Ok(Vec::new()),
            }
        }
        .await;
        Envelope::from_result(result)
    }

    /// Edit an entity in place. The key never changes.
    pub async fn update_entity(
        &self,
        tenant_id: &str,
        key: &str,
        patch: &EntityPatch,
    ) -> KgResult<Envelope<Entity>> {
        let adapter = self.adapter();
        let result = async {
            if let Some(confidence) = patch.confidence {
                if !is_valid_confidence(confidence) {
                    let reason = format!("confidence {confidence} is outside [0, 1]");
                    return Err(KgError::validation(reason));
                }
            }
            if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                return Err(KgError::validation("name must not be empty"));
            }
            let partition = self
                .existing_partition(adapter.as_ref(), tenant_id)
                .await?
                .ok_or_else(|| missing_entity(key))?;
            let mut entity = adapter
                .get_entity(&partition, key)
                .await?
                .ok_or_else(|| missing_entity(key))?;
            patch.apply(&mut entity);
            let rejected =
                adapter.upsert_entities(&partition, std::slice::from_ref(&entity)).await?;
            if let Some(failure) = rejected.into_iter().next() {
                return Err(KgError::query(failure.reason));
            }
            Ok(entity)
        }
        .await;

        if result.is_ok() {
            self.registry.publish(GraphEvent::EntityEdited { tenant_id: tenant_id.to_string() });
            info!(tenant_id, key, "Edited entity");
        }
        Envelope::from_result(result)
    }

    /// Edit a relation's confidence, inferred flag or properties.
    pub async fn update_relation(
        &self,
        tenant_id: &str,
        graph_id: &str,
        key: &str,
        patch: &RelationPatch,
    ) -> KgResult<Envelope<Relation>> {
        let adapter = self.adapter();
        let result = async {
            if let Some(confidence) = patch.confidence {
                if !is_valid_confidence(confidence) {
                    let reason = format!("confidence {confidence} is outside [0, 1]");
                    return Err(KgError::validation(reason));
                }
            }
            let partition = self
                .existing_partition(adapter.as_ref(), tenant_id)
                .await?
                .ok_or_else(|| missing_relation(key, graph_id))?;
            let mut relation = adapter
                .get_relation(&partition, graph_id, key)
                .await?
                .ok_or_else(|| missing_relation(key, graph_id))?;
            patch.apply(&mut relation);
            let rejected =
                adapter.upsert_relations(&partition, std::slice::from_ref(&relation)).await?;
            if let Some(failure) = rejected.into_iter().next() {
                return Err(KgError::query(failure.reason));
            }
            Ok(relation)
        }
        .await;

        if result.is_ok() {
            self.registry.publish(GraphEvent::GraphUpdated {
                tenant_id: tenant_id.to_string(),
                graph_id: graph_id.to_string(),
            });
            info!(tenant_id, graph_id, key, "Edited relation");
        }
        Envelope::from_result(result)
    }

    /// Raw triples of a graph for in-process consumers (analytics,
    /// visualization). Errors are returned as-is.
    pub async fn export_triples(
        &self,
        tenant_id: &str,
        graph_id: &str,
    ) -> KgResult<Vec<TripleRecord>> {
        let adapter = self.adapter();
        match self.existing_partition(adapter.as_ref(), tenant_id).await? {
            Some(partition) => {
                GraphQueryEngine::new(adapter).load_graph(&partition, graph_id).await
            }
            None => Ok(Vec::new()),
        }
    }

    /// Processing state of the last ingestion into `graph_id`, if any.
    pub fn graph_status(&self, tenant_id: &str, graph_id: &str) -> Option<GraphProcessingState> {
        self.statuses
            .lock()
            .get(&(tenant_id.to_string(), graph_id.to_string()))
            .cloned()
    }

    /// Enter `Created` the first time a graph id is seen. Known graphs keep
    /// their current state.
    fn record_created(&self, tenant_id: &str, graph_id: &str) {
        let now = Utc::now();
        self.statuses
            .lock()
            .entry((tenant_id.to_string(), graph_id.to_string()))
            .or_insert_with(|| GraphProcessingState {
                status: GraphStatus::Created,
                error: None,
                created_at: now,
                updated_at: now,
            });
    }

    fn transition(
        &self,
        tenant_id: &str,
        graph_id: &str,
        next: GraphStatus,
        error: Option<String>,
    ) {
        let mut statuses = self.statuses.lock();
        let key = (tenant_id.to_string(), graph_id.to_string());
        let now = Utc::now();
        let (current, created_at) = match statuses.get(&key) {
            Some(state) => (state.status, state.created_at),
            None => (GraphStatus::Created, now),
        };
        if !current.can_transition_to(next) {
            warn!(
                tenant_id,
                graph_id,
                from = %current,
                to = %next,
                "Unexpected graph status transition"
            );
        }
        let state = GraphProcessingState { status: next, error, created_at, updated_at: now };
        statuses.insert(key, state);
    }
}

fn missing_entity(key: &str) -> KgError {
    KgError::validation(format!("entity '{key}' not found"))
}

fn missing_relation(key: &str, graph_id: &str) -> KgError {
    KgError::validation(format!("relation '{key}' not found in graph '{graph_id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kgraph_core::GraphDatabaseConfig;

    async fn store() -> KnowledgeGraphStore {
        let registry =
            GraphDatabaseRegistry::connect(GraphDatabaseConfig::in_memory()).await.unwrap();
        KnowledgeGraphStore::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn first_sight_of_a_graph_records_created() {
        let store = store().await;
        store.record_created("t1", "g1");
        let state = store.graph_status("t1", "g1").unwrap();
        assert_eq!(state.status, GraphStatus::Created);
        assert_eq!(state.created_at, state.updated_at);

        store.transition("t1", "g1", GraphStatus::Processing, None);
        store.transition("t1", "g1", GraphStatus::Completed, None);
        store.record_created("t1", "g1");
        let state = store.graph_status("t1", "g1").unwrap();
        assert_eq!(state.status, GraphStatus::Completed);
    }

    #[tokio::test]
    async fn a_failed_first_save_stays_at_created() {
        let store = store().await;
        let report = store.save_knowledge_graph("", "g1", &[]).await.unwrap();
        assert!(!report.success);
        assert_eq!(store.graph_status("", "g1").unwrap().status, GraphStatus::Created);
    }
}
