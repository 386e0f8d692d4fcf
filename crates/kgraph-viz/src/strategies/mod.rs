//! Render strategies and the table that selects them by name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tera::Tera;
use tracing::debug;

use kgraph_analytics::AdvancedMetrics;
use kgraph_core::TripleRecord;

use crate::config::RenderConfig;
use crate::error::VizResult;
use crate::statistics::VisualizationStatistics;

mod enhanced;
mod interactive;
mod simple;

pub use enhanced::EnhancedStrategy;
pub use interactive::InteractiveStrategy;
pub use simple::SimpleStrategy;

/// Name used when a requested strategy is unknown.
pub const DEFAULT_STRATEGY: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub html: String,
    pub statistics: VisualizationStatistics,
}

pub trait RenderStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(
        &self,
        triples: &[TripleRecord],
        config: &RenderConfig,
        metrics: Option<&AdvancedMetrics>,
    ) -> VizResult<RenderOutput>;
}

/// Compile the bundled templates.
pub fn templates() -> VizResult<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../../templates/base.html.tera")),
        ("simple.html", include_str!("../../templates/simple.html.tera")),
        ("interactive.html", include_str!("../../templates/interactive.html.tera")),
        ("enhanced.html", include_str!("../../templates/enhanced.html.tera")),
    ])?;
    Ok(tera)
}

/// Fixed dispatch table from strategy name to renderer.
pub struct StrategyTable {
    strategies: BTreeMap<&'static str, Arc<dyn RenderStrategy>>,
    fallback: Arc<dyn RenderStrategy>,
}

impl StrategyTable {
    /// `simple`, `interactive`, `enhanced` and `default`, the last being
    /// the interactive renderer.
    pub fn new() -> VizResult<Self> {
        let tera = Arc::new(templates()?);
        let interactive: Arc<dyn RenderStrategy> = Arc::new(InteractiveStrategy::new(tera.clone()));

        let mut strategies: BTreeMap<&'static str, Arc<dyn RenderStrategy>> = BTreeMap::new();
        strategies.insert("simple", Arc::new(SimpleStrategy::new(tera.clone())));
        strategies.insert("interactive", interactive.clone());
        strategies.insert("enhanced", Arc::new(EnhancedStrategy::new(tera)));
        strategies.insert(DEFAULT_STRATEGY, interactive.clone());
        Ok(Self { strategies, fallback: interactive })
    }

    /// Strategy registered under `name`, falling back to `default`.
    pub fn select(&self, name: &str) -> Arc<dyn RenderStrategy> {
        let key = name.trim().to_lowercase();
        match self.strategies.get(key.as_str()) {
            Some(strategy) => strategy.clone(),
            None => {
                debug!(requested = name, "Unknown visualization type; using default");
                self.fallback.clone()
            }
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_templates_compile() {
        let tera = templates().unwrap();
        let names: Vec<&str> = tera.get_template_names().collect();
        assert!(names.contains(&"enhanced.html"));
    }

    #[test]
    fn dispatch_by_name_with_fallback() {
        let table = StrategyTable::new().unwrap();
        assert_eq!(table.names(), vec!["default", "enhanced", "interactive", "simple"]);
        assert_eq!(table.select("simple").name(), "simple");
        assert_eq!(table.select(" Enhanced ").name(), "enhanced");
        assert_eq!(table.select("3d-globe").name(), table.select("default").name());
    }
}
