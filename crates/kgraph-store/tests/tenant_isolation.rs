//! Tenant isolation across partitioning layouts.

use std::sync::Arc;

use kgraph_core::{
    BackendType, GraphDatabaseConfig, IsolationStrategy, RawTriple, ShardingStrategy,
    StorageStrategy,
};
use kgraph_store::{GraphDatabaseRegistry, KnowledgeGraphStore};

async fn store_with(config: GraphDatabaseConfig) -> KnowledgeGraphStore {
    let registry = GraphDatabaseRegistry::connect(config).await.unwrap();
    KnowledgeGraphStore::new(Arc::new(registry))
}

fn facts(subject: &str) -> Vec<RawTriple> {
    vec![
        RawTriple::new(subject, "owns", "Ledger"),
        RawTriple::new("Ledger", "lists", "Invoice"),
    ]
}

async fn assert_isolated(store: &KnowledgeGraphStore) {
    store.save_knowledge_graph("alpha", "g", &facts("Alice")).await.unwrap();
    store.save_knowledge_graph("beta", "g", &facts("Bruno")).await.unwrap();

    let alpha = store.load_knowledge_graph("alpha", "g").await.unwrap().triples;
    let beta = store.load_knowledge_graph("beta", "g").await.unwrap().triples;
    assert!(alpha.iter().all(|t| t.subject != "Bruno"));
    assert!(beta.iter().all(|t| t.subject != "Alice"));

    // "Ledger" exists in both tenants; traversal must not cross over.
    let from_ledger =
        store.subgraph("beta", "Bruno", 3, 100, None).await.unwrap().into_data().unwrap();
    assert!(from_ledger.iter().all(|t| t.subject != "Alice"));

    store.delete_knowledge_graph("alpha", "g").await.unwrap();
    assert!(store.load_knowledge_graph("alpha", "g").await.unwrap().triples.is_empty());
    assert_eq!(store.load_knowledge_graph("beta", "g").await.unwrap().triples.len(), 2);

    let stats = store.statistics("gamma", "g").await.unwrap().into_data().unwrap();
    assert_eq!(stats.relations, 0);
}

#[tokio::test]
async fn per_schema_partitions_are_isolated() {
    assert_isolated(&store_with(GraphDatabaseConfig::in_memory()).await).await;
}

#[tokio::test]
async fn per_database_partitions_are_isolated() {
    let mut config = GraphDatabaseConfig::in_memory();
    config.isolation.strategy = IsolationStrategy::PerDatabase;
    assert_isolated(&store_with(config).await).await;
}

#[tokio::test]
async fn tenants_sharing_a_hashed_partition_stay_isolated() {
    let mut config = GraphDatabaseConfig::in_memory();
    config.isolation.sharding = ShardingStrategy::Hashed { buckets: 1 };
    let store = store_with(config).await;

    let adapter = store.adapter();
    let a = adapter.create_tenant_context("alpha").await.unwrap();
    let b = adapter.create_tenant_context("beta").await.unwrap();
    assert_eq!(a.partition, b.partition);

    assert_isolated(&store).await;
}

#[tokio::test]
async fn file_backed_partitions_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = GraphDatabaseConfig::new(BackendType::HybridRelationalGraph);
    config.storage_strategy = StorageStrategy::Hybrid;
    config.isolation.strategy = IsolationStrategy::PerDatabase;
    config.hybrid.data_dir = dir.path().join("graphs");

    {
        let store = store_with(config.clone()).await;
        store.save_knowledge_graph("alpha", "g", &facts("Alice")).await.unwrap();
        store.save_knowledge_graph("beta", "g", &facts("Bruno")).await.unwrap();
        store.registry().shutdown().await.unwrap();
    }
    assert!(dir.path().join("graphs").join("kg_tenant_alpha.sqlite3").exists());
    assert!(dir.path().join("graphs").join("kg_tenant_beta.sqlite3").exists());

    let store = store_with(config).await;
    let alpha = store.load_knowledge_graph("alpha", "g").await.unwrap().triples;
    assert_eq!(alpha.len(), 2);
    assert!(alpha.iter().any(|t| t.subject == "Alice"));
}

#[tokio::test]
async fn concurrent_first_saves_for_one_tenant() {
    let store = Arc::new(store_with(GraphDatabaseConfig::in_memory()).await);
    let mut tasks = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let triples = vec![RawTriple::new("Hub", "links", &format!("Node {i}"))];
            store.save_knowledge_graph("fresh", "g", &triples).await
        }));
    }
    for task in tasks {
        let report = task.await.unwrap().unwrap();
        assert!(report.success);
        assert!(report.errors.is_empty());
    }
    let stats = store.statistics("fresh", "g").await.unwrap().into_data().unwrap();
    assert_eq!(stats.relations, 8);
    assert_eq!(stats.entities, 9);
}

#[tokio::test]
async fn reads_and_deletes_never_provision_a_tenant() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("graphs");
    let mut config = GraphDatabaseConfig::new(BackendType::HybridRelationalGraph);
    config.storage_strategy = StorageStrategy::Hybrid;
    config.isolation.strategy = IsolationStrategy::PerDatabase;
    config.hybrid.data_dir = data_dir.clone();
    let store = store_with(config).await;

    let deleted = store.delete_knowledge_graph("ghost", "g").await.unwrap();
    assert!(!deleted.success);
    assert_eq!(deleted.relations_deleted, 0);
    assert!(deleted.error.unwrap().contains("not found"));

    let loaded = store.load_knowledge_graph("ghost", "g").await.unwrap();
    assert!(loaded.success);
    assert!(loaded.triples.is_empty());
    let stats = store.statistics("ghost", "g").await.unwrap().into_data().unwrap();
    assert_eq!((stats.entities, stats.relations), (0, 0));
    let graphs = store.list_graphs("ghost").await.unwrap().into_data().unwrap();
    assert!(graphs.is_empty());
    let rows = store.subgraph("ghost", "Alice", 2, 10, None).await.unwrap().into_data().unwrap();
    assert!(rows.is_empty());

    assert!(!data_dir.join("kg_tenant_ghost.sqlite3").exists());
    let leftovers = std::fs::read_dir(&data_dir).map(|entries| entries.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
    assert!(store.adapter().tenants().cached("ghost").is_none());
}

#[tokio::test]
async fn deleting_in_an_unknown_shared_schema_tenant_reports_not_found() {
    let store = store_with(GraphDatabaseConfig::in_memory()).await;
    store.save_knowledge_graph("alpha", "g", &facts("Alice")).await.unwrap();

    let deleted = store.delete_knowledge_graph("ghost", "g").await.unwrap();
    assert!(!deleted.success);
    assert_eq!(store.load_knowledge_graph("alpha", "g").await.unwrap().triples.len(), 2);
}
