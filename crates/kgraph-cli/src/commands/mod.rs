//! CLI command definitions and handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use kgraph_core::GraphDatabaseConfig;
use kgraph_store::{GraphDatabaseRegistry, KnowledgeGraphStore, RelationKeyStrategy};

pub mod analyze;
pub mod graph;
pub mod visualize;

/// KGraph - multi-tenant knowledge graph storage and analytics
#[derive(Parser)]
#[command(name = "kgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// TOML configuration file (defaults to environment variables)
    #[arg(short, long, global = true, env = "KGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use a throwaway in-memory backend (overrides --config)
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Tenant to operate on
    #[arg(short, long, global = true, env = "KGRAPH_TENANT", default_value = "default")]
    pub tenant: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest triples from a JSON array file ("-" for stdin)
    Ingest(graph::IngestArgs),

    /// Print every triple of a graph
    Load {
        graph_id: String,
    },

    /// Delete a graph's relations
    Delete {
        graph_id: String,
    },

    /// List the tenant's graphs
    Graphs,

    /// Bounded outbound traversal from an entity
    Subgraph(graph::SubgraphArgs),

    /// Entity/relation counts, density and average degree
    Stats {
        graph_id: String,
    },

    /// Compute graph-algorithm metrics
    Analyze(analyze::AnalyzeArgs),

    /// Render a graph to an HTML file
    Visualize(visualize::VisualizeArgs),

    /// Backend health and tenant partition
    Status,

    /// Edit an entity in place
    EditEntity(graph::EditEntityArgs),
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum KeyStrategyArg {
    /// Re-ingesting a fact overwrites it
    #[default]
    ContentHash,
    /// Every ingestion appends
    Ordinal,
}

impl From<KeyStrategyArg> for RelationKeyStrategy {
    fn from(arg: KeyStrategyArg) -> Self {
        match arg {
            KeyStrategyArg::ContentHash => RelationKeyStrategy::ContentHash,
            KeyStrategyArg::Ordinal => RelationKeyStrategy::Ordinal,
        }
    }
}

/// Options every handler needs.
pub struct Session {
    pub store: Arc<KnowledgeGraphStore>,
    pub tenant: String,
    pub json: bool,
}

impl Cli {
    fn load_config(&self) -> Result<GraphDatabaseConfig> {
        if self.in_memory {
            return Ok(GraphDatabaseConfig::in_memory());
        }
        match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                GraphDatabaseConfig::from_toml_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))
            }
            None => GraphDatabaseConfig::from_env()
                .context("Failed to load config from environment (try --in-memory or --config)"),
        }
    }

    pub async fn execute(self) -> Result<()> {
        let config = self.load_config()?;
        let registry = GraphDatabaseRegistry::connect(config)
            .await
            .context("Failed to connect to graph database")?;

        let key_strategy = match &self.command {
            Commands::Ingest(args) => args.key_strategy,
            _ => KeyStrategyArg::default(),
        };
        let store =
            KnowledgeGraphStore::new(Arc::new(registry)).with_key_strategy(key_strategy.into());
        let session = Session { store: Arc::new(store), tenant: self.tenant, json: self.json };

        let result = match self.command {
            Commands::Ingest(args) => graph::cmd_ingest(&session, args).await,
            Commands::Load { graph_id } => graph::cmd_load(&session, &graph_id).await,
            Commands::Delete { graph_id } => graph::cmd_delete(&session, &graph_id).await,
            Commands::Graphs => graph::cmd_graphs(&session).await,
            Commands::Subgraph(args) => graph::cmd_subgraph(&session, args).await,
            Commands::Stats { graph_id } => graph::cmd_stats(&session, &graph_id).await,
            Commands::Analyze(args) => analyze::execute(&session, args).await,
            Commands::Visualize(args) => visualize::execute(&session, args).await,
            Commands::Status => graph::cmd_status(&session).await,
            Commands::EditEntity(args) => graph::cmd_edit_entity(&session, args).await,
        };

        if let Err(e) = session.store.registry().shutdown().await {
            warn!(error = %e, "Graph backend did not shut down cleanly");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definitions_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn in_memory_wins_over_a_config_file() {
        let cli =
            Cli::parse_from(["kgraph", "--in-memory", "--config", "/nonexistent.toml", "graphs"]);
        let config = cli.load_config().unwrap();
        assert_eq!(config, GraphDatabaseConfig::in_memory());
    }

    #[test]
    fn ingest_accepts_the_ordinal_key_strategy() {
        let cli =
            Cli::parse_from(["kgraph", "ingest", "g1", "facts.json", "--key-strategy", "ordinal"]);
        match cli.command {
            Commands::Ingest(args) => {
                assert_eq!(args.graph_id, "g1");
                let strategy = RelationKeyStrategy::from(args.key_strategy);
                assert!(matches!(strategy, RelationKeyStrategy::Ordinal));
            }
            _ => panic!("expected ingest"),
        }
    }
}
