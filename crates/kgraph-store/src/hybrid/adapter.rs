//! [`GraphBackendAdapter`] over relational tables (SQLite) with graph
//! traversal layered on top.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info, warn};

use kgraph_core::{
    BackendType, Entity, IsolationStrategy, KgError, KgResult, PartitionHandle, PerformanceConfig,
    Properties, Relation, TenantIsolationResolver, TripleRecord,
};

use super::schema::Tables;
use crate::adapter::{GraphBackendAdapter, GraphCounts, GraphSummary, ItemFailure};
use crate::tenants::TenantRegistry;

/// SQLite's default bound-parameter ceiling is far above this; chunking keeps
/// statements small for very wide frontiers.
const MAX_IN_PARAMS: usize = 500;

/// Virtual-machine steps between deadline checks.
const PROGRESS_OPS: std::os::raw::c_int = 1000;

/// Connection key of the database shared by per-schema partitions.
const SHARED_DB: &str = "shared";

type SharedConnection = Arc<Mutex<Connection>>;

/// Where database files live.
#[derive(Debug, Clone)]
enum StorageMode {
    Files(PathBuf),
    Memory,
}

pub struct HybridGraphAdapter {
    mode: StorageMode,
    performance: PerformanceConfig,
    connections: Mutex<HashMap<String, SharedConnection>>,
    initialized: AtomicBool,
    tenants: TenantRegistry,
}

impl HybridGraphAdapter {
    /// Adapter storing one SQLite file per database under `data_dir`.
    pub fn with_data_dir(
        data_dir: impl Into<PathBuf>,
        performance: PerformanceConfig,
        resolver: TenantIsolationResolver,
    ) -> Self {
        Self::build(StorageMode::Files(data_dir.into()), performance, resolver)
    }

    /// Adapter keeping every database in memory. Nothing survives `close`.
    pub fn in_memory(performance: PerformanceConfig, resolver: TenantIsolationResolver) -> Self {
        Self::build(StorageMode::Memory, performance, resolver)
    }

    fn build(
        mode: StorageMode,
        performance: PerformanceConfig,
        resolver: TenantIsolationResolver,
    ) -> Self {
        Self {
            mode,
            performance,
            connections: Mutex::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            tenants: TenantRegistry::new(resolver),
        }
    }

    fn connection_key(partition: &PartitionHandle) -> &str {
        match partition.isolation {
            IsolationStrategy::PerSchema => SHARED_DB,
            IsolationStrategy::PerDatabase => &partition.partition,
        }
    }

    /// Open (or reuse) the connection holding `partition`.
    fn connection(&self, partition: &PartitionHandle) -> KgResult<SharedConnection> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(KgError::unavailable("hybrid graph adapter is not initialized"));
        }
        let key = Self::connection_key(partition);
        let mut connections = self.connections.lock();
        if let Some(conn) = connections.get(key) {
            return Ok(conn.clone());
        }
        let conn = Arc::new(Mutex::new(self.open(key)?));
        connections.insert(key.to_string(), conn.clone());
        Ok(conn)
    }

    fn open(&self, key: &str) -> KgResult<Connection> {
        let conn = match &self.mode {
            StorageMode::Memory => Connection::open_in_memory().map_err(sql_error)?,
            StorageMode::Files(dir) => {
                let path = dir.join(format!("{key}.sqlite3"));
                let conn = Connection::open(&path).map_err(sql_error)?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })
                    .map_err(sql_error)?;
                conn.pragma_update(None, "synchronous", "NORMAL").map_err(sql_error)?;
                debug!(path = %path.display(), "Opened hybrid database file");
                conn
            }
        };
        conn.busy_timeout(self.performance.query_timeout()).map_err(sql_error)?;
        Ok(conn)
    }

    /// Run `work` against the partition's connection on the blocking pool.
    ///
    /// The query timeout is enforced inside SQLite: once the deadline passes
    /// the running statement is interrupted, an open transaction rolls back
    /// when dropped, and the call fails with [`KgError::Timeout`]. A result
    /// that comes back `Ok` has therefore always been committed.
    async fn with_conn<T, F>(&self, partition: &PartitionHandle, work: F) -> KgResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &Tables, &str) -> KgResult<T> + Send + 'static,
    {
        let conn = self.connection(partition)?;
        let tables = Tables::for_partition(partition);
        let tenant_id = partition.tenant_id.clone();
        let timeout = self.performance.query_timeout();
        let deadline = Instant::now() + timeout;

        let task = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            let expired = Arc::new(AtomicBool::new(false));
            let flag = expired.clone();
            guard.progress_handler(
                PROGRESS_OPS,
                Some(move || {
                    let over = Instant::now() >= deadline;
                    if over {
                        flag.store(true, Ordering::Relaxed);
                    }
                    over
                }),
            );
            let result = work(&mut guard, &tables, &tenant_id);
            guard.progress_handler(PROGRESS_OPS, None::<fn() -> bool>);
            match result {
                Err(_) if expired.load(Ordering::Relaxed) => Err(KgError::Timeout(timeout)),
                other => other,
            }
        });

        task.await.map_err(|join| KgError::query(format!("storage task failed: {join}")))?
    }
}

#[async_trait]
impl GraphBackendAdapter for HybridGraphAdapter {
    fn backend_type(&self) -> BackendType {
        BackendType::HybridRelationalGraph
    }

    fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    async fn initialize(&self) -> KgResult<()> {
        if let StorageMode::Files(dir) = &self.mode {
            std::fs::create_dir_all(dir).map_err(|e| {
                KgError::unavailable(format!("cannot create data directory {}: {e}", dir.display()))
            })?;
        }
        self.initialized.store(true, Ordering::Release);
        info!(mode = ?self.mode, "Hybrid graph adapter initialized");
        Ok(())
    }

    async fn health_check(&self) -> KgResult<()> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(KgError::unavailable("hybrid graph adapter is not initialized"));
        }
        let open: Vec<SharedConnection> = self.connections.lock().values().cloned().collect();
        tokio::task::spawn_blocking(move || {
            for conn in open {
                conn.lock()
                    .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                    .map_err(sql_error)?;
            }
            Ok::<_, KgError>(())
        })
        .await
        .map_err(|e| KgError::query(format!("health check task failed: {e}")))?
    }

    async fn close(&self) -> KgResult<()> {
        self.tenants.clear();
        self.connections.lock().clear();
        if self.initialized.swap(false, Ordering::AcqRel) {
            info!("Hybrid graph adapter closed");
        }
        Ok(())
    }

    async fn provision_partition(&self, partition: &PartitionHandle) -> KgResult<()> {
        let name = partition.partition.clone();
        self.with_conn(partition, |conn, tables, _| {
            conn.execute_batch(&tables.ddl()).map_err(sql_error)
        })
        .await?;
        info!(partition = %name, "Provisioned hybrid partition");
        Ok(())
    }

    async fn partition_exists(&self, partition: &PartitionHandle) -> KgResult<bool> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(KgError::unavailable("hybrid graph adapter is not initialized"));
        }
        let key = Self::connection_key(partition);
        let open = self.connections.lock().contains_key(key);
        if !open {
            match &self.mode {
                StorageMode::Memory => return Ok(false),
                StorageMode::Files(dir) => {
                    if !dir.join(format!("{key}.sqlite3")).exists() {
                        return Ok(false);
                    }
                }
            }
        }
        self.with_conn(partition, |conn, tables, _| {
            let found: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![tables.relations_name()],
                    |row| row.get(0),
                )
                .map_err(sql_error)?;
            Ok(found > 0)
        })
        .await
    }

    async fn upsert_entities(
        &self,
        partition: &PartitionHandle,
        entities: &[Entity],
    ) -> KgResult<Vec<ItemFailure>> {
        let entities = entities.to_vec();
        let count = entities.len();
        let failures = self
            .with_conn(partition, move |conn, tables, tenant_id| {
                let tx = conn.transaction().map_err(sql_error)?;
                let mut failures = Vec::new();
                {
                    let mut stmt = tx
                        .prepare(&format!(
                            "INSERT INTO {} (tenant_id, key, name, entity_type, confidence,
                                             properties, created_at)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                             ON CONFLICT(tenant_id, key) DO UPDATE SET
                                 name = excluded.name,
                                 entity_type = excluded.entity_type,
                                 confidence = excluded.confidence,
                                 properties = excluded.properties",
                            tables.entities
                        ))
                        .map_err(sql_error)?;
                    for entity in &entities {
                        let properties = serde_json::to_string(&entity.properties)?;
                        let outcome = stmt.execute(params![
                            tenant_id,
                            entity.key,
                            entity.name,
                            entity.entity_type,
                            entity.confidence,
                            properties,
                            entity.created_at.to_rfc3339(),
                        ]);
                        if let Err(e) = outcome {
                            let e = sql_error(e);
                            if e.is_fatal() {
                                return Err(e);
                            }
                            failures.push(ItemFailure::new(&entity.key, e.to_string()));
                        }
                    }
                }
                tx.commit().map_err(sql_error)?;
                Ok(failures)
            })
            .await?;

        debug!(
            tenant_id = %partition.tenant_id,
            count,
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
        let relations = relations.to_vec();
        let count = relations.len();
        let failures = self
            .with_conn(partition, move |conn, tables, tenant_id| {
                let tx = conn.transaction().map_err(sql_error)?;
                let mut failures = Vec::new();
                {
                    // Both endpoints must already exist in the tenant's scope.
                    let mut stmt = tx
                        .prepare(&format!(
                            "INSERT INTO {rel} (tenant_id, graph_id, key, from_key, to_key,
                                                predicate, confidence, inferred, properties,
                                                created_at)
                             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
                             WHERE EXISTS (SELECT 1 FROM {ent} WHERE tenant_id = ?1 AND key = ?4)
                               AND EXISTS (SELECT 1 FROM {ent} WHERE tenant_id = ?1 AND key = ?5)
                             ON CONFLICT(tenant_id, graph_id, key) DO UPDATE SET
                                 from_key = excluded.from_key,
                                 to_key = excluded.to_key,
                                 predicate = excluded.predicate,
                                 confidence = excluded.confidence,
                                 inferred = excluded.inferred,
                                 properties = excluded.properties",
                            rel = tables.relations,
                            ent = tables.entities,
                        ))
                        .map_err(sql_error)?;
                    for relation in &relations {
                        let properties = serde_json::to_string(&relation.properties)?;
                        let outcome = stmt.execute(params![
                            tenant_id,
                            relation.graph_id,
                            relation.key,
                            relation.from,
                            relation.to,
                            relation.predicate,
                            relation.confidence,
                            relation.inferred,
                            properties,
                            relation.created_at.to_rfc3339(),
                        ]);
                        match outcome {
                            Ok(0) => {
                                let missing = "endpoint entity missing";
                                failures.push(ItemFailure::new(&relation.key, missing));
                            }
                            Ok(_) => {}
                            Err(e) => {
                                let e = sql_error(e);
                                if e.is_fatal() {
                                    return Err(e);
                                }
                                failures.push(ItemFailure::new(&relation.key, e.to_string()));
                            }
                        }
                    }
                }
                tx.commit().map_err(sql_error)?;
                Ok(failures)
            })
            .await?;

        if !failures.is_empty() {
            warn!(
                tenant_id = %partition.tenant_id,
                failed = failures.len(),
                "Some relations were not stored"
            );
        }
        debug!(
            tenant_id = %partition.tenant_id,
            count,
            failed = failures.len(),
            "Upserted relations"
        );
        Ok(failures)
    }

    async fn get_entity(&self, partition: &PartitionHandle, key: &str) -> KgResult<Option<Entity>> {
        let key = key.to_string();
        self.with_conn(partition, move |conn, tables, tenant_id| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT key, name, entity_type, confidence, properties, created_at
                         FROM {} WHERE tenant_id = ?1 AND key = ?2",
                        tables.entities
                    ),
                    params![tenant_id, key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, f64>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                        ))
                    },
                )
                .optional()
                .map_err(sql_error)?;

            row.map(|fields| -> KgResult<Entity> {
                let (key, name, entity_type, confidence, properties, created_at) = fields;
                Ok(Entity {
                    key,
                    name,
                    entity_type,
                    confidence,
                    properties: serde_json::from_str(&properties)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn get_relation(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
        key: &str,
    ) -> KgResult<Option<Relation>> {
        let graph_id = graph_id.to_string();
        let key = key.to_string();
        self.with_conn(partition, move |conn, tables, tenant_id| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT key, from_key, to_key, predicate, confidence, graph_id, inferred,
                                properties, created_at
                         FROM {} WHERE tenant_id = ?1 AND graph_id = ?2 AND key = ?3",
                        tables.relations
                    ),
                    params![tenant_id, graph_id, key],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, f64>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, bool>(6)?,
                            row.get::<_, String>(7)?,
                            row.get::<_, String>(8)?,
                        ))
                    },
                )
                .optional()
                .map_err(sql_error)?;

            row.map(|fields| -> KgResult<Relation> {
                let (
                    key,
                    from,
                    to,
                    predicate,
                    confidence,
                    graph_id,
                    inferred,
                    properties,
                    created_at,
                ) = fields;
                Ok(Relation {
                    key,
                    from,
                    to,
                    predicate,
                    confidence,
                    graph_id,
                    inferred,
                    properties: serde_json::from_str(&properties)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn graph_triples(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<Vec<TripleRecord>> {
        let graph_id = graph_id.to_string();
        self.with_conn(partition, move |conn, tables, tenant_id| {
            let sql = format!(
                "{} WHERE r.tenant_id = ?1 AND r.graph_id = ?2 {}",
                triple_select(tables),
                TRIPLE_ORDER
            );
            let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
            let rows = stmt
                .query_map(params![tenant_id, graph_id], raw_triple_row)
                .map_err(sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_error)?;
            rows.into_iter().map(RawTripleRow::into_record).collect()
        })
        .await
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
        let from_keys = from_keys.to_vec();
        let graph_id = graph_id.map(str::to_string);
        self.with_conn(partition, move |conn, tables, tenant_id| {
            let mut rows = Vec::new();
            for chunk in from_keys.chunks(MAX_IN_PARAMS) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let graph_filter = if graph_id.is_some() { "AND r.graph_id = ?" } else { "" };
                let sql = format!(
                    "{} WHERE r.tenant_id = ? AND r.from_key IN ({placeholders}) {graph_filter}
                     {} LIMIT ?",
                    triple_select(tables),
                    TRIPLE_ORDER
                );

                let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() + 3);
                values.push(tenant_id.to_string().into());
                values.extend(chunk.iter().map(|k| k.clone().into()));
                if let Some(graph_id) = &graph_id {
                    values.push(graph_id.clone().into());
                }
                values.push(i64::try_from(limit).unwrap_or(i64::MAX).into());

                let mut stmt = conn.prepare(&sql).map_err(sql_error)?;
                let chunk_rows = stmt
                    .query_map(params_from_iter(values), raw_triple_row)
                    .map_err(sql_error)?
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(sql_error)?;
                rows.extend(chunk_rows);
            }

            // Chunks are each ordered; restore the global order before cutting.
            rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
            rows.truncate(limit);
            rows.into_iter().map(RawTripleRow::into_record).collect()
        })
        .await
    }

    async fn graph_counts(
        &self,
        partition: &PartitionHandle,
        graph_id: &str,
    ) -> KgResult<GraphCounts> {
        let graph_id = graph_id.to_string();
        self.with_conn(partition, move |conn, tables, tenant_id| {
            let (relations, entities): (i64, i64) = conn
                .query_row(
                    &format!(
                        "SELECT
                             (SELECT COUNT(*) FROM {rel} WHERE tenant_id = ?1 AND graph_id = ?2),
                             (SELECT COUNT(*) FROM (
                                 SELECT from_key FROM {rel} WHERE tenant_id = ?1 AND graph_id = ?2
                                 UNION
                                 SELECT to_key FROM {rel} WHERE tenant_id = ?1 AND graph_id = ?2
                             ))",
                        rel = tables.relations
                    ),
                    params![tenant_id, graph_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(sql_error)?;
            Ok(GraphCounts {
                entities: usize::try_from(entities).unwrap_or(0),
                relations: usize::try_from(relations).unwrap_or(0),
            })
        })
        .await
    }

    async fn list_graphs(&self, partition: &PartitionHandle) -> KgResult<Vec<GraphSummary>> {
        self.with_conn(partition, move |conn, tables, tenant_id| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT graph_id, COUNT(*) FROM {} WHERE tenant_id = ?1
                     GROUP BY graph_id ORDER BY graph_id",
                    tables.relations
                ))
                .map_err(sql_error)?;
            let graphs = stmt
                .query_map(params![tenant_id], |row| {
                    Ok(GraphSummary {
                        graph_id: row.get(0)?,
                        relations: usize::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
                    })
                })
                .map_err(sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(sql_error)?;
            Ok(graphs)
        })
        .await
    }

    async fn delete_graph(&self, partition: &PartitionHandle, graph_id: &str) -> KgResult<usize> {
        let graph_id = graph_id.to_string();
        self.with_conn(partition, move |conn, tables, tenant_id| {
            conn.execute(
                &format!("DELETE FROM {} WHERE tenant_id = ?1 AND graph_id = ?2", tables.relations),
                params![tenant_id, graph_id],
            )
            .map_err(sql_error)
        })
        .await
    }
}

const TRIPLE_ORDER: &str = "ORDER BY a.name, r.predicate, b.name, r.key";

fn triple_select(tables: &Tables) -> String {
    format!(
        "SELECT r.key, r.graph_id, a.key, a.name, a.entity_type, r.predicate,
                b.key, b.name, b.entity_type, r.confidence, r.inferred, r.properties
         FROM {rel} r
         JOIN {ent} a ON a.tenant_id = r.tenant_id AND a.key = r.from_key
         JOIN {ent} b ON b.tenant_id = r.tenant_id AND b.key = r.to_key",
        rel = tables.relations,
        ent = tables.entities,
    )
}

/// A triple row before its JSON properties are decoded.
struct RawTripleRow {
    record: TripleRecord,
    properties: String,
}

impl RawTripleRow {
    fn sort_key(&self) -> (&str, &str, &str, &str) {
        (&self.record.subject, &self.record.predicate, &self.record.object, &self.record.key)
    }

    fn into_record(self) -> KgResult<TripleRecord> {
        let properties: Properties = serde_json::from_str(&self.properties)?;
        Ok(TripleRecord { properties, ..self.record })
    }
}

fn raw_triple_row(row: &Row<'_>) -> rusqlite::Result<RawTripleRow> {
    Ok(RawTripleRow {
        record: TripleRecord {
            key: row.get(0)?,
            graph_id: row.get(1)?,
            subject_key: row.get(2)?,
            subject: row.get(3)?,
            subject_type: row.get(4)?,
            predicate: row.get(5)?,
            object_key: row.get(6)?,
            object: row.get(7)?,
            object_type: row.get(8)?,
            confidence: row.get(9)?,
            inferred: row.get(10)?,
            properties: Properties::new(),
        },
        properties: row.get(11)?,
    })
}

fn parse_timestamp(raw: &str) -> KgResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| KgError::query(format!("invalid created_at '{raw}': {e}")))
}

/// Files that cannot be opened or read are an unavailable backend; everything
/// else is a failed statement.
fn sql_error(error: rusqlite::Error) -> KgError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &error {
        if matches!(
            failure.code,
            ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::PermissionDenied
                | ErrorCode::SystemIoFailure
        ) {
            return KgError::unavailable(error.to_string());
        }
    }
    KgError::query(error.to_string())
}
