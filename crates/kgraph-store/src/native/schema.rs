//! Partition provisioning on the native graph engine.

use neo4rs::Query;
use tracing::info;

use kgraph_core::{IsolationStrategy, KgResult, PartitionHandle};

use super::client::NativeClient;

/// Label of every entity node.
pub const ENTITY_LABEL: &str = "KgEntity";

/// Type of every relation edge.
pub const RELATION_TYPE: &str = "KG_RELATION";

/// Constraints and indexes of a partition. Safe to run repeatedly.
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE CONSTRAINT kg_entity_key IF NOT EXISTS
     FOR (e:KgEntity) REQUIRE (e.tenant_id, e.key) IS UNIQUE",
    "CREATE INDEX kg_entity_name IF NOT EXISTS FOR (e:KgEntity) ON (e.tenant_id, e.name)",
    "CREATE INDEX kg_relation_graph IF NOT EXISTS
     FOR ()-[r:KG_RELATION]-() ON (r.tenant_id, r.graph_id)",
];

/// Database holding a partition's records.
///
/// Per-database isolation maps the partition onto a database of its own;
/// database names may not contain underscores, so those become dashes.
/// Per-schema isolation shares `shared_db` and relies on the `tenant_id`
/// carried by every record.
pub fn database_for(partition: &PartitionHandle, shared_db: &str) -> String {
    match partition.isolation {
        IsolationStrategy::PerDatabase => neo4j_database_name(&partition.partition),
        IsolationStrategy::PerSchema => shared_db.to_string(),
    }
}

/// Engine-legal database name for a partition.
pub fn neo4j_database_name(partition: &str) -> String {
    let mut name: String = partition
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '.' | '-') => c,
            _ => '-',
        })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        name.insert_str(0, "kg-");
    }
    name
}

/// Create the partition's database (when isolated per database) and its
/// schema.
pub async fn provision(
    client: &NativeClient,
    partition: &PartitionHandle,
    shared_db: &str,
) -> KgResult<()> {
    let db = database_for(partition, shared_db);
    if partition.isolation == IsolationStrategy::PerDatabase {
        client
            .run_on("system", Query::new(format!("CREATE DATABASE `{db}` IF NOT EXISTS WAIT")))
            .await?;
    }

    for statement in SCHEMA_STATEMENTS {
        client.run_on(&db, Query::new(statement.to_string())).await?;
    }

    info!(
        partition = %partition.partition,
        database = %db,
        statements = SCHEMA_STATEMENTS.len(),
        "Provisioned native partition"
    );
    Ok(())
}
