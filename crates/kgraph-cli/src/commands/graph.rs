//! Storage and query commands.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use kgraph_core::{keys, EntityPatch, RawTriple};
use kgraph_store::Envelope;

use super::{KeyStrategyArg, Session};
use crate::output;

#[derive(Args)]
pub struct IngestArgs {
    /// Target graph id
    pub graph_id: String,

    /// JSON file holding an array of triples ("-" reads stdin)
    pub file: PathBuf,

    /// How relation keys are derived
    #[arg(long, value_enum, default_value_t = KeyStrategyArg::ContentHash)]
    pub key_strategy: KeyStrategyArg,
}

#[derive(Args)]
pub struct SubgraphArgs {
    /// Entity name to start from
    pub center: String,

    /// Maximum hops
    #[arg(long, default_value = "2")]
    pub depth: usize,

    /// Maximum rows returned
    #[arg(long, default_value = "100")]
    pub limit: usize,

    /// Only follow relations of this graph
    #[arg(long)]
    pub graph: Option<String>,
}

#[derive(Args)]
pub struct EditEntityArgs {
    /// Entity name (or key with --by-key)
    pub entity: String,

    /// Treat ENTITY as a stored key instead of a name
    #[arg(long)]
    pub by_key: bool,

    /// New display name
    #[arg(long)]
    pub name: Option<String>,

    /// New entity type
    #[arg(long = "type")]
    pub entity_type: Option<String>,

    /// New confidence in [0, 1]
    #[arg(long)]
    pub confidence: Option<f64>,
}

/// Unwrap a successful envelope or turn its error into a CLI error.
fn data<T>(envelope: Envelope<T>) -> Result<T> {
    match envelope {
        Envelope { success: true, data: Some(data), .. } => Ok(data),
        Envelope { error, .. } => {
            bail!("{}", error.unwrap_or_else(|| "operation failed".to_string()))
        }
    }
}

fn read_triples(path: &Path) -> Result<Vec<RawTriple>> {
    let raw = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).context("Failed to read triples from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&raw)
        .context("Expected a JSON array of {subject, predicate, object} triples")
}

pub async fn cmd_ingest(session: &Session, args: IngestArgs) -> Result<()> {
    let triples = read_triples(&args.file)?;
    let report = session
        .store
        .save_knowledge_graph(&session.tenant, &args.graph_id, &triples)
        .await?;

    if session.json {
        return output::print_json(&report);
    }
    output::print_save_report(&report, triples.len());
    if let Some(state) = session.store.graph_status(&session.tenant, &args.graph_id) {
        println!("{}: {}", "Status".bold(), output::status_colored(state.status));
    }
    if !report.success {
        bail!("ingestion into '{}' failed", args.graph_id);
    }
    Ok(())
}

pub async fn cmd_load(session: &Session, graph_id: &str) -> Result<()> {
    let loaded = session.store.load_knowledge_graph(&session.tenant, graph_id).await?;
    if session.json {
        return output::print_json(&loaded);
    }
    if let Some(error) = loaded.error {
        bail!(error);
    }
    println!("{} {}", "Graph".bold(), graph_id.cyan());
    output::print_triples(&loaded.triples);
    Ok(())
}

pub async fn cmd_delete(session: &Session, graph_id: &str) -> Result<()> {
    let deleted = session.store.delete_knowledge_graph(&session.tenant, graph_id).await?;
    if session.json {
        return output::print_json(&deleted);
    }
    if !deleted.success {
        bail!(deleted.error.unwrap_or_else(|| format!("could not delete '{graph_id}'")));
    }
    println!(
        "{} {} ({} relations removed)",
        "Deleted".green().bold(),
        graph_id.cyan(),
        deleted.relations_deleted
    );
    Ok(())
}

pub async fn cmd_graphs(session: &Session) -> Result<()> {
    let graphs = data(session.store.list_graphs(&session.tenant).await?)?;
    if session.json {
        return output::print_json(&graphs);
    }
    output::print_graphs(&session.tenant, &graphs);
    Ok(())
}

pub async fn cmd_subgraph(session: &Session, args: SubgraphArgs) -> Result<()> {
    let envelope = session
        .store
        .subgraph(&session.tenant, &args.center, args.depth, args.limit, args.graph.as_deref())
        .await?;
    let rows = data(envelope)?;
    if session.json {
        return output::print_json(&rows);
    }
    println!(
        "{} {} (depth={}, limit={})",
        "Exploring from".bold(),
        args.center.yellow(),
        args.depth,
        args.limit
    );
    output::print_triples(&rows);
    Ok(())
}

pub async fn cmd_stats(session: &Session, graph_id: &str) -> Result<()> {
    let stats = data(session.store.statistics(&session.tenant, graph_id).await?)?;
    if session.json {
        return output::print_json(&stats);
    }
    output::print_statistics(&stats);
    Ok(())
}

pub async fn cmd_status(session: &Session) -> Result<()> {
    let config = session.store.registry().config();
    let health = session.store.health_check().await;
    let adapter = session.store.adapter();
    let partition = adapter.create_tenant_context(&session.tenant).await;

    if session.json {
        return output::print_json(&serde_json::json!({
            "backend": config.db_type.as_str(),
            "storage_strategy": config.storage_strategy,
            "isolation": config.isolation,
            "healthy": health.is_ok(),
            "error": health.as_ref().err().map(|e| e.to_string()),
            "tenant_id": session.tenant,
            "partition": partition.as_ref().ok().map(|p| p.partition.clone()),
        }));
    }

    println!("{}", "Graph database".bold());
    println!("{}", "─".repeat(50));
    println!("  {:<18} {}", "Backend", config.db_type.as_str().cyan());
    println!("  {:<18} {:?}", "Storage", config.storage_strategy);
    println!("  {:<18} {:?}", "Isolation", config.isolation.strategy);
    println!("  {:<18} {}", "Sharding", config.isolation.sharding);
    match &health {
        Ok(()) => println!("  {:<18} {}", "Health", "ok".green()),
        Err(e) => println!("  {:<18} {} ({e})", "Health", "unavailable".red()),
    }
    match &partition {
        Ok(p) => println!("  {:<18} {} → {}", "Tenant", session.tenant.yellow(), p.partition),
        Err(e) => println!("  {:<18} {} ({e})", "Tenant", session.tenant.yellow()),
    }
    health.context("Graph backend health check failed")
}

pub async fn cmd_edit_entity(session: &Session, args: EditEntityArgs) -> Result<()> {
    let key = if args.by_key { args.entity.clone() } else { keys::entity_key(&args.entity) };
    let patch = EntityPatch {
        name: args.name,
        entity_type: args.entity_type,
        confidence: args.confidence,
        properties: None,
    };
    let entity = data(session.store.update_entity(&session.tenant, &key, &patch).await?)?;
    if session.json {
        return output::print_json(&entity);
    }
    println!("{} {}", "Updated".green().bold(), entity.name.cyan());
    println!("  {:<12} {}", "Key", entity.key.dimmed());
    println!("  {:<12} {}", "Type", entity.entity_type);
    println!("  {:<12} {:.2}", "Confidence", entity.confidence);
    Ok(())
}
