//! Terminal output formatting.

use anyhow::Result;
use colored::{ColoredString, Colorize};
use serde::Serialize;

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::{GraphStatus, TripleRecord};
use kgraph_store::{GraphStatistics, GraphSummary, SaveReport};
use kgraph_viz::VisualizationStatistics;

/// Pretty-printed JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn status_colored(status: GraphStatus) -> ColoredString {
    match status {
        GraphStatus::Created => "created".dimmed(),
        GraphStatus::Processing => "processing".yellow(),
        GraphStatus::Completed => "completed".green(),
        GraphStatus::Failed => "failed".red(),
    }
}

/// Print the outcome of an ingestion run.
pub fn print_save_report(report: &SaveReport, submitted: usize) {
    let headline = if report.success { "Saved".green().bold() } else { "Failed".red().bold() };
    println!("{} {} ({} triples submitted)", headline, report.graph_id.cyan(), submitted);
    println!("  {:<12} {}", "Entities", report.entities_inserted);
    println!("  {:<12} {}", "Relations", report.relations_inserted);

    if let Some(error) = &report.error {
        println!("  {:<12} {}", "Error", error.red());
    }
    if !report.errors.is_empty() {
        println!();
        println!("{} ({})", "Rejected triples".yellow().bold(), report.errors.len());
        for failure in &report.errors {
            let field = failure.field.as_deref().map(|f| format!(" [{f}]")).unwrap_or_default();
            println!("  #{:<5}{} {}", failure.index, field.dimmed(), failure.reason);
        }
    }
}

/// Print triples as a table.
pub fn print_triples(triples: &[TripleRecord]) {
    if triples.is_empty() {
        println!("{}", "No relations found.".dimmed());
        return;
    }

    println!("{:<24} {:<20} {:<24} {:>6}", "Subject", "Predicate", "Object", "Conf");
    println!("{}", "─".repeat(78));
    for t in triples {
        let predicate =
            if t.inferred { t.predicate.dimmed().italic() } else { t.predicate.normal() };
        println!(
            "{:<24} {:<20} {:<24} {:>6.2}",
            truncate(&t.subject, 22),
            predicate,
            truncate(&t.object, 22),
            t.confidence
        );
    }
    let inferred = triples.iter().filter(|t| t.inferred).count();
    println!();
    println!("{} relations ({} inferred)", triples.len(), inferred);
}

pub fn print_statistics(stats: &GraphStatistics) {
    println!("{} {}", "Graph".bold(), stats.graph_id.cyan());
    println!("{}", "─".repeat(40));
    println!("  {:<14} {}", "Entities", stats.entities);
    println!("  {:<14} {}", "Relations", stats.relations);
    println!("  {:<14} {:.4}", "Density", stats.density);
    println!("  {:<14} {:.2}", "Avg degree", stats.avg_degree);
}

pub fn print_graphs(tenant_id: &str, graphs: &[GraphSummary]) {
    if graphs.is_empty() {
        println!("{}", format!("No graphs stored for tenant '{tenant_id}'.").dimmed());
        return;
    }
    println!("{:<40} {:>10}", "Graph", "Relations");
    println!("{}", "─".repeat(51));
    for g in graphs {
        println!("{:<40} {:>10}", truncate(&g.graph_id, 38), g.relations);
    }
}

pub fn print_visualization(path: &str, stats: &VisualizationStatistics) {
    println!("{} {}", "Wrote".green().bold(), path.cyan());
    println!(
        "  {} nodes, {} edges ({} inferred), density {:.4}",
        stats.nodes, stats.edges, stats.inferred_edges, stats.density
    );
}

/// Print computed analytics.
pub fn print_metrics(metrics: &AdvancedMetrics) {
    let cached = if metrics.cached { " (cached)".dimmed() } else { "".normal() };
    println!("{} {}{}", "Analytics for".bold(), metrics.graph_id.cyan(), cached);
    println!("  {} nodes, {} edges", metrics.node_count, metrics.edge_count);
    println!("  algorithms: {}", metrics.algorithms.join(", "));

    if let Some(centrality) = &metrics.centrality {
        println!();
        println!("{}", "Centrality".bold());
        for (label, scores) in [
            ("degree", &centrality.degree),
            ("betweenness", &centrality.betweenness),
            ("closeness", &centrality.closeness),
            ("eigenvector", &centrality.eigenvector),
        ] {
            let Some(scores) = scores else { continue };
            let mut ranked: Vec<(&String, &f64)> = scores.iter().collect();
            ranked.sort_by(|a, b| b.1.total_cmp(a.1).then_with(|| a.0.cmp(b.0)));
            let top: Vec<String> = ranked
                .iter()
                .take(5)
                .map(|(key, score)| {
                    format!("{} {:.3}", truncate(metrics.display_name(key), 20), score)
                })
                .collect();
            println!("  {:<12} {}", label, top.join(", "));
        }
    }

    if let Some(communities) = &metrics.communities {
        println!();
        println!("{} (modularity {:.4})", "Communities".bold(), communities.modularity);
        for (i, members) in communities.communities.iter().enumerate().take(10) {
            let names: Vec<&str> = members.iter().map(|key| metrics.display_name(key)).collect();
            println!("  {:>3}. {}", i + 1, truncate(&names.join(", "), 70));
        }
        if communities.communities.len() > 10 {
            println!("  {}", format!("... {} more", communities.communities.len() - 10).dimmed());
        }
    }

    if let Some(clustering) = &metrics.clustering {
        println!();
        println!("{}", "Clustering".bold());
        println!("  {:<12} {:.4}", "average", clustering.average_clustering);
        println!("  {:<12} {:.4}", "transitivity", clustering.transitivity);
    }

    if let Some(paths) = &metrics.paths {
        println!();
        println!("{}", "Paths".bold());
        println!("  {:<12} {} ({} components)", "connected", paths.connected, paths.components);
        if let Some(avg) = paths.average_shortest_path_length {
            println!("  {:<12} {:.4}", "avg length", avg);
        }
        if let Some(diameter) = paths.diameter {
            println!("  {:<12} {}", "diameter", diameter);
        }
    }
}

/// Truncate on a char boundary, appending "...".
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Zürich–Genève link", 10), "Zürich–...");
        assert_eq!(truncate("abc", 2), "...");
    }
}
