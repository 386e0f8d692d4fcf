//! The persistence contract every physical backend implements.
//!
//! Adapters expose tenant-scoped primitives only. Ingestion, traversal,
//! statistics and result envelopes are built on top of them by the pipeline,
//! the query engine and [`crate::KnowledgeGraphStore`], so behaviour stays
//! identical across backends. Backend-native types never leave an adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use kgraph_core::{BackendType, Entity, KgResult, PartitionHandle, Relation, TripleRecord};

use crate::tenants::TenantRegistry;

/// A single record the backend refused, keyed by the record key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub key: String,
    pub reason: String,
}

impl ItemFailure {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { key: key.into(), reason: reason.into() }
    }
}

/// Relation and distinct-endpoint counts of one graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphCounts {
    pub entities: usize,
    pub relations: usize,
}

/// A graph id present in a tenant partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub graph_id: String,
    pub relations: usize,
}

/// Tenant-scoped persistence primitives.
///
/// Errors: connectivity or authentication problems surface as
/// `KgError::BackendUnavailable` and are never retried here; every other
/// failure is a non-fatal `KgError::Query` that callers fold into a result
/// envelope.
#[async_trait]
pub trait GraphBackendAdapter: Send + Sync {
    fn backend_type(&self) -> BackendType;

    /// Tenant contexts created through this adapter.
    fn tenants(&self) -> &TenantRegistry;

    /// Establish connectivity. Fails fast with `BackendUnavailable`.
    async fn initialize(&self) -> KgResult<()>;

    /// Cheap round-trip proving the backend still answers.
    async fn health_check(&self) -> KgResult<()>;

    /// Release pooled connections and forget cached tenant contexts.
    async fn close(&self) -> KgResult<()>;

    /// Create the physical partition (database or schema) if missing.
    /// Must be idempotent: several tenants may share one partition.
    async fn provision_partition(&self, partition: &PartitionHandle) -> KgResult<()>;

    /// Insert or overwrite entities; per-item failures are returned, not
    /// raised.
    async fn upsert_entities(
        &self,
        partition: &PartitionHandle,
        entities: &[Entity],
    ) -> KgResult<Vec<ItemFailure>>;

    /// Insert or overwrite relations whose endpoints already exist.
    async fn upsert_relations(
        &self,
        partition: &PartitionHandle,
        relations: &[Relation],
    ) -> KgResult<Vec<ItemFailure>>;

    async fn get_entity(&self, partition: &PartitionHandle, key: &str) -> KgResult<Option<Entity>>;

    async fn get_relation(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
        key: &str,
    ) -> KgResult<Option<Relation>>;

    /// Every relation tagged with `graph_id`, endpoints resolved to names,
    /// ordered by `(subject, predicate, object)`.
    async fn graph_triples(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<Vec<TripleRecord>>;

    /// Relations leaving any of `from_keys`, optionally restricted to one
    /// graph, same ordering as [`Self::graph_triples`], at most `limit` rows.
    async fn outbound_triples(
        &self,
        partition: &PartitionHandle,
        from_keys: &[String],
        graph_id: Option<&str>,
        limit: usize,
    ) -> KgResult<Vec<TripleRecord>>;

    async fn graph_counts(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<GraphCounts>;

    async fn list_graphs(&self, partition: &PartitionHandle) -> KgResult<Vec<GraphSummary>>;

    /// Delete every relation tagged with `graph_id` and return how many were
    /// removed. Entities are left in place even when orphaned.
    async fn delete_graph(&self, partition: &PartitionHandle, graph_id: &str) -> KgResult<usize>;

    /// Whether `partition` has been provisioned. Never creates anything.
    async fn partition_exists(&self, partition: &PartitionHandle) -> KgResult<bool>;

    /// Resolve `tenant_id` to its partition only if that partition already
    /// exists. Nothing is provisioned.
    async fn existing_tenant_context(&self, tenant_id: &str) -> KgResult<Option<PartitionHandle>> {
        if let Some(handle) = self.tenants().cached(tenant_id) {
            return Ok(Some(handle));
        }
        let handle = self.tenants().resolver().resolve(tenant_id)?;
        Ok(self.partition_exists(&handle).await?.then_some(handle))
    }

    /// Resolve `tenant_id` to its partition, provisioning it on first use.
    ///
    /// Concurrent first calls for the same tenant provision exactly once.
    async fn create_tenant_context(&self, tenant_id: &str) -> KgResult<PartitionHandle> {
        self.tenants()
            .get_or_create(tenant_id, |handle| async move {
                self.provision_partition(&handle).await?;
                Ok(handle)
            })
            .await
    }
}
