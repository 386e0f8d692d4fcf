//! Render options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub title: String,
    /// Pixels.
    pub width: u32,
    /// Pixels.
    pub height: u32,
    /// Animate a force layout in the browser.
    pub physics: bool,
    pub show_inferred: bool,
    /// Keep only the most connected nodes beyond this many.
    pub max_nodes: usize,
    pub color_by_type: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: "Knowledge Graph".to_string(),
            width: 1200,
            height: 800,
            physics: true,
            show_inferred: true,
            max_nodes: 500,
            color_by_type: true,
        }
    }
}

impl RenderConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}
