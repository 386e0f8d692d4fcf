//! [`GraphBackendAdapter`] over a native property-graph engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use neo4rs::{Query, Row};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use kgraph_core::{
    BackendType, Entity, IsolationStrategy, KgError, KgResult, NativeConnection, PartitionHandle,
    PerformanceConfig, Properties, Relation, TenantIsolationResolver, TripleRecord,
};

use super::client::NativeClient;
use super::schema::{self, ENTITY_LABEL, RELATION_TYPE};
use crate::adapter::{GraphBackendAdapter, GraphCounts, GraphSummary, ItemFailure};
use crate::tenants::TenantRegistry;

/// Columns shared by every triple-returning query.
const TRIPLE_COLUMNS: &str = "r.key AS key, r.graph_id AS graph_id,
     a.key AS subject_key, a.name AS subject, a.entity_type AS subject_type,
     r.predicate AS predicate,
     b.key AS object_key, b.name AS object, b.entity_type AS object_type,
     r.confidence AS confidence, r.inferred AS inferred, r.properties AS properties";

const TRIPLE_ORDER: &str = "ORDER BY subject, predicate, object, key";

pub struct NativeGraphAdapter {
    connection: NativeConnection,
    performance: PerformanceConfig,
    client: RwLock<Option<NativeClient>>,
    tenants: TenantRegistry,
}

impl NativeGraphAdapter {
    pub fn new(
        connection: NativeConnection,
        performance: PerformanceConfig,
        resolver: TenantIsolationResolver,
    ) -> Self {
        Self {
            connection,
            performance,
            client: RwLock::new(None),
            tenants: TenantRegistry::new(resolver),
        }
    }

    fn client(&self) -> KgResult<NativeClient> {
        self.client
            .read()
            .clone()
            .ok_or_else(|| KgError::unavailable("native graph adapter is not initialized"))
    }

    fn database(&self, partition: &PartitionHandle) -> String {
        schema::database_for(partition, &self.connection.database)
    }

    async fn triples(
        &self,
        partition: &PartitionHandle,
        query: Query,
    ) -> KgResult<Vec<TripleRecord>> {
        let rows = self.client()?.query_on(&self.database(partition), query).await?;
        rows.iter().map(row_to_triple).collect()
    }
}

#[async_trait]
impl GraphBackendAdapter for NativeGraphAdapter {
    fn backend_type(&self) -> BackendType {
        BackendType::NativeGraphEngine
    }

    fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    async fn initialize(&self) -> KgResult<()> {
        if self.client.read().is_some() {
            return Ok(());
        }
        let client = NativeClient::connect(
            &self.connection,
            self.performance.pool_size,
            self.performance.query_timeout(),
        )
        .await?;
        *self.client.write() = Some(client);
        info!(uri = %self.connection.uri, "Native graph adapter initialized");
        Ok(())
    }

    async fn health_check(&self) -> KgResult<()> {
        self.client()?
            .run_on(&self.connection.database, Query::new("RETURN 1".to_string()))
            .await
    }

    async fn close(&self) -> KgResult<()> {
        self.tenants.clear();
        if self.client.write().take().is_some() {
            info!("Native graph adapter closed");
        }
        Ok(())
    }

    async fn partition_exists(&self, partition: &PartitionHandle) -> KgResult<bool> {
        let client = self.client()?;
        if partition.isolation == IsolationStrategy::PerSchema {
            // Per-schema partitions live in the shared database and need no
            // creation step of their own.
            return Ok(true);
        }
        let query = Query::new(
            "SHOW DATABASES YIELD name WHERE name = $name RETURN count(*) AS found".to_string(),
        )
        .param("name", self.database(partition));
        let found = client.query_scalar_on("system", query, "found").await?.unwrap_or(0);
        Ok(found > 0)
    }

    async fn provision_partition(&self, partition: &PartitionHandle) -> KgResult<()> {
        schema::provision(&self.client()?, partition, &self.connection.database).await
    }

    async fn upsert_entities(
        &self,
        partition: &PartitionHandle,
        entities: &[Entity],
    ) -> KgResult<Vec<ItemFailure>> {
        let client = self.client()?;
        let db = self.database(partition);
        let mut failures = Vec::new();

        for entity in entities {
            let query = Query::new(format!(
                "MERGE (e:{ENTITY_LABEL} {{tenant_id: $tenant_id, key: $key}})
                 ON CREATE SET e.created_at = $created_at
                 SET e.name = $name,
                     e.entity_type = $entity_type,
                     e.confidence = $confidence,
                     e.properties = $properties"
            ))
            .param("tenant_id", partition.tenant_id.as_str())
            .param("key", entity.key.as_str())
            .param("created_at", entity.created_at.to_rfc3339())
            .param("name", entity.name.as_str())
            .param("entity_type", entity.entity_type.as_str())
            .param("confidence", entity.confidence)
            .param("properties", serde_json::to_string(&entity.properties)?);

            match client.write_on(&db, query).await.map(|_| ()) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(key = %entity.key, error = %e, "Entity upsert rejected");
                    failures.push(ItemFailure::new(&entity.key, e.to_string()));
                }
            }
        }

        debug!(
            tenant_id = %partition.tenant_id,
            count = entities.len(),
            failed = failures.len(),
            "Upserted entities"
        );
        Ok(failures)
    }

    async fn upsert_relations(
        &self,
        partition: &PartitionHandle,
        relations: &[Relation],
    ) -> KgResult<Vec<ItemFailure>> {
        let client = self.client()?;
        let db = self.database(partition);
        let mut failures = Vec::new();

        for relation in relations {
            let query = Query::new(format!(
                "MATCH (a:{ENTITY_LABEL} {{tenant_id: $tenant_id, key: $from}}),
                       (b:{ENTITY_LABEL} {{tenant_id: $tenant_id, key: $to}})
                 MERGE (a)-[r:{RELATION_TYPE} {{
                     tenant_id: $tenant_id, graph_id: $graph_id, key: $key
                 }}]->(b)
                 ON CREATE SET r.created_at = $created_at
                 SET r.predicate = $predicate,
                     r.confidence = $confidence,
                     r.inferred = $inferred,
                     r.properties = $properties
                 RETURN count(r) AS written"
            ))
            .param("tenant_id", partition.tenant_id.as_str())
            .param("from", relation.from.as_str())
            .param("to", relation.to.as_str())
            .param("graph_id", relation.graph_id.as_str())
            .param("key", relation.key.as_str())
            .param("created_at", relation.created_at.to_rfc3339())
            .param("predicate", relation.predicate.as_str())
            .param("confidence", relation.confidence)
            .param("inferred", relation.inferred)
            .param("properties", serde_json::to_string(&relation.properties)?);

            match client.write_scalar_on(&db, query, "written").await {
                Ok(Some(written)) if written > 0 => {}
                Ok(_) => failures.push(ItemFailure::new(&relation.key, "endpoint entity missing")),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(key = %relation.key, error = %e, "Relation upsert rejected");
                    failures.push(ItemFailure::new(&relation.key, e.to_string()));
                }
            }
        }

        debug!(
            tenant_id = %partition.tenant_id,
            count = relations.len(),
            failed = failures.len(),
            "Upserted relations"
        );
        Ok(failures)
    }

    async fn get_entity(&self, partition: &PartitionHandle, key: &str) -> KgResult<Option<Entity>> {
        let query = Query::new(format!(
            "MATCH (e:{ENTITY_LABEL} {{tenant_id: $tenant_id, key: $key}})
             RETURN e.key AS key, e.name AS name, e.entity_type AS entity_type,
                    e.confidence AS confidence, e.properties AS properties,
                    e.created_at AS created_at"
        ))
        .param("tenant_id", partition.tenant_id.as_str())
        .param("key", key);

        let rows = self.client()?.query_on(&self.database(partition), query).await?;
        rows.first()
            .map(|row| -> KgResult<Entity> {
                Ok(Entity {
                    key: field(row, "key")?,
                    name: field(row, "name")?,
                    entity_type: field(row, "entity_type")?,
                    confidence: field(row, "confidence")?,
                    properties: properties(row)?,
                    created_at: timestamp(row)?,
                })
            })
            .transpose()
    }

    async fn get_relation(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
        key: &str,
    ) -> KgResult<Option<Relation>> {
        let query = Query::new(format!(
            "MATCH (a:{ENTITY_LABEL})-[r:{RELATION_TYPE}]->(b:{ENTITY_LABEL})
             WHERE r.tenant_id = $tenant_id AND r.graph_id = $graph_id AND r.key = $key
             RETURN r.key AS key, a.key AS from, b.key AS to, r.predicate AS predicate,
                    r.confidence AS confidence, r.graph_id AS graph_id, r.inferred AS inferred,
                    r.properties AS properties, r.created_at AS created_at"
        ))
        .param("tenant_id", partition.tenant_id.as_str())
        .param("graph_id", graph_id)
        .param("key", key);

        let rows = self.client()?.query_on(&self.database(partition), query).await?;
        rows.first()
            .map(|row| -> KgResult<Relation> {
                Ok(Relation {
                    key: field(row, "key")?,
                    from: field(row, "from")?,
                    to: field(row, "to")?,
                    predicate: field(row, "predicate")?,
                    confidence: field(row, "confidence")?,
                    graph_id: field(row, "graph_id")?,
                    inferred: field(row, "inferred")?,
                    properties: properties(row)?,
                    created_at: timestamp(row)?,
                })
            })
            .transpose()
    }

    async fn graph_triples(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<Vec<TripleRecord>> {
        let query = Query::new(format!(
            "MATCH (a:{ENTITY_LABEL})-[r:{RELATION_TYPE}]->(b:{ENTITY_LABEL})
             WHERE r.tenant_id = $tenant_id AND r.graph_id = $graph_id
             RETURN {TRIPLE_COLUMNS}
             {TRIPLE_ORDER}"
        ))
        .param("tenant_id", partition.tenant_id.as_str())
        .param("graph_id", graph_id);

        self.triples(partition, query).await
    }

    async fn outbound_triples(
        &self,
        partition: &PartitionHandle,
        from_keys: &[String],
        graph_id: Option<&str>,
        limit: usize,
    ) -> KgResult<Vec<TripleRecord>> {
        if from_keys.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let graph_filter = if graph_id.is_some() { "AND r.graph_id = $graph_id" } else { "" };
        let mut query = Query::new(format!(
            "MATCH (a:{ENTITY_LABEL})-[r:{RELATION_TYPE}]->(b:{ENTITY_LABEL})
             WHERE a.tenant_id = $tenant_id AND r.tenant_id = $tenant_id
               AND a.key IN $keys {graph_filter}
             RETURN {TRIPLE_COLUMNS}
             {TRIPLE_ORDER}
             LIMIT $limit"
        ))
        .param("tenant_id", partition.tenant_id.as_str())
        .param("keys", from_keys.to_vec())
        .param("limit", i64::try_from(limit).unwrap_or(i64::MAX));
        if let Some(graph_id) = graph_id {
            query = query.param("graph_id", graph_id);
        }

        self.triples(partition, query).await
    }

    async fn graph_counts(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<GraphCounts> {
        let query = Query::new(format!(
            "MATCH (a:{ENTITY_LABEL})-[r:{RELATION_TYPE}]->(b:{ENTITY_LABEL})
             WHERE r.tenant_id = $tenant_id AND r.graph_id = $graph_id
             UNWIND [a.key, b.key] AS endpoint
             RETURN count(DISTINCT endpoint) AS entities, count(DISTINCT r) AS relations"
        ))
        .param("tenant_id", partition.tenant_id.as_str())
        .param("graph_id", graph_id);

        let rows = self.client()?.query_on(&self.database(partition), query).await?;
        match rows.first() {
            Some(row) => Ok(GraphCounts {
                entities: count(row, "entities")?,
                relations: count(row, "relations")?,
            }),
            None => Ok(GraphCounts::default()),
        }
    }

    async fn list_graphs(&self, partition: &PartitionHandle) -> KgResult<Vec<GraphSummary>> {
        let query = Query::new(format!(
            "MATCH ()-[r:{RELATION_TYPE} {{tenant_id: $tenant_id}}]->()
             RETURN r.graph_id AS graph_id, count(r) AS relations
             ORDER BY graph_id"
        ))
        .param("tenant_id", partition.tenant_id.as_str());

        let rows = self.client()?.query_on(&self.database(partition), query).await?;
        rows.iter()
            .map(|row| -> KgResult<GraphSummary> {
                Ok(GraphSummary {
                    graph_id: field(row, "graph_id")?,
                    relations: count(row, "relations")?,
                })
            })
            .collect()
    }

    async fn delete_graph(&self, partition: &PartitionHandle, graph_id: &str) -> KgResult<usize> {
        let query = Query::new(format!(
            "MATCH ()-[r:{RELATION_TYPE} {{tenant_id: $tenant_id, graph_id: $graph_id}}]->()
             DELETE r
             RETURN count(r) AS deleted"
        ))
        .param("tenant_id", partition.tenant_id.as_str())
        .param("graph_id", graph_id);

        let deleted = self
            .client()?
            .write_scalar_on(&self.database(partition), query, "deleted")
            .await?
            .unwrap_or(0);
        Ok(usize::try_from(deleted).unwrap_or(0))
    }
}

fn field<T: DeserializeOwned>(row: &Row, name: &str) -> KgResult<T> {
    row.get(name)
        .map_err(|e| KgError::query(format!("failed to read field '{name}': {e:?}")))
}

fn count(row: &Row, name: &str) -> KgResult<usize> {
    let value: i64 = field(row, name)?;
    Ok(usize::try_from(value).unwrap_or(0))
}

fn properties(row: &Row) -> KgResult<Properties> {
    let raw: String = field(row, "properties")?;
    Ok(serde_json::from_str(&raw)?)
}

fn timestamp(row: &Row) -> KgResult<DateTime<Utc>> {
    let raw: String = field(row, "created_at")?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| KgError::query(format!("invalid created_at '{raw}': {e}")))
}

fn row_to_triple(row: &Row) -> KgResult<TripleRecord> {
    Ok(TripleRecord {
        key: field(row, "key")?,
        graph_id: field(row, "graph_id")?,
        subject_key: field(row, "subject_key")?,
        subject: field(row, "subject")?,
        subject_type: field(row, "subject_type")?,
        predicate: field(row, "predicate")?,
        object_key: field(row, "object_key")?,
        object: field(row, "object")?,
        object_type: field(row, "object_type")?,
        confidence: field(row, "confidence")?,
        inferred: field(row, "inferred")?,
        properties: properties(row)?,
    })
}
