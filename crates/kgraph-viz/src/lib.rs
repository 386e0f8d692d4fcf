//! KGraph Visualization
//!
//! Turns a graph's triples, optionally with analytics, into a standalone
//! HTML page. Rendering strategies are picked by name from a fixed table.

pub mod bridge;
pub mod config;
pub mod error;
pub mod payload;
pub mod statistics;
pub mod strategies;

pub use bridge::VisualizationBridge;
pub use config::RenderConfig;
pub use error::{VizError, VizResult};
pub use payload::{GraphPayload, VisEdge, VisNode};
pub use statistics::VisualizationStatistics;
pub use strategies::{RenderOutput, RenderStrategy, StrategyTable};
