//! Relational layout of a partition.

use kgraph_core::{IsolationStrategy, PartitionHandle};

/// Table names of one partition.
///
/// Per-schema isolation keeps every partition in one shared database file and
/// namespaces the tables by partition. Per-database isolation gives each
/// partition its own file, so plain names suffice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub entities: String,
    pub relations: String,
    relations_name: String,
    index_prefix: String,
}

impl Tables {
    pub fn for_partition(partition: &PartitionHandle) -> Self {
        match partition.isolation {
            IsolationStrategy::PerSchema => {
                let relations_name = format!("{}__relations", partition.partition);
                Self {
                    entities: quote(&format!("{}__entities", partition.partition)),
                    relations: quote(&relations_name),
                    relations_name,
                    index_prefix: partition.partition.clone(),
                }
            }
            IsolationStrategy::PerDatabase => Self {
                entities: "entities".to_string(),
                relations: "relations".to_string(),
                relations_name: "relations".to_string(),
                index_prefix: "kg".to_string(),
            },
        }
    }

    /// Unquoted relations table name, as recorded in `sqlite_master`.
    pub fn relations_name(&self) -> &str {
        &self.relations_name
    }

    /// DDL creating the partition's tables and indexes. Idempotent.
    pub fn ddl(&self) -> String {
        let Tables { entities, relations, index_prefix, .. } = self;
        format!(
            "CREATE TABLE IF NOT EXISTS {entities} (
                tenant_id TEXT NOT NULL,
                key TEXT NOT NULL,
                name TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                confidence REAL NOT NULL,
                properties TEXT NOT NULL DEFAULT '{{}}',
                created_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, key)
            );
            CREATE INDEX IF NOT EXISTS {idx_name} ON {entities}(tenant_id, name);
            CREATE TABLE IF NOT EXISTS {relations} (
                tenant_id TEXT NOT NULL,
                graph_id TEXT NOT NULL,
                key TEXT NOT NULL,
                from_key TEXT NOT NULL,
                to_key TEXT NOT NULL,
                predicate TEXT NOT NULL,
                confidence REAL NOT NULL,
                inferred INTEGER NOT NULL DEFAULT 0,
                properties TEXT NOT NULL DEFAULT '{{}}',
                created_at TEXT NOT NULL,
                PRIMARY KEY (tenant_id, graph_id, key)
            );
            CREATE INDEX IF NOT EXISTS {idx_from} ON {relations}(tenant_id, from_key);
            CREATE INDEX IF NOT EXISTS {idx_graph} ON {relations}(tenant_id, graph_id);",
            idx_name = quote(&format!("{index_prefix}__idx_entity_name")),
            idx_from = quote(&format!("{index_prefix}__idx_relation_from")),
            idx_graph = quote(&format!("{index_prefix}__idx_relation_graph")),
        )
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
