use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Which signal is consulted first when arbitrating between candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Date-to-left, then strict green, then soft green.
    #[default]
    DateFirst,
    /// Strict green, then soft green, then date-to-left.
    ColorFirst,
}

/// Traversal caps bounding the worst-case work of every matcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Longest text (chars) a candidate node may carry.
    pub max_candidate_text: usize,
    /// Longest text (chars) of a date marker inside the geometric scope.
    pub max_date_text: usize,
    /// Longest text (chars) of a preceding sibling checked for a date.
    pub max_sibling_date_text: usize,
    pub date_ancestor_levels: usize,
    pub date_scope_nodes: usize,
    /// Horizontal slack (px) when testing "right edge before left edge".
    pub left_tolerance_px: f64,
    pub preceding_siblings: usize,
    pub color_ancestor_levels: usize,
    pub color_scope_nodes: usize,
    pub class_ancestor_levels: usize,
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            max_candidate_text: 80,
            max_date_text: 20,
            max_sibling_date_text: 30,
            date_ancestor_levels: 4,
            date_scope_nodes: 800,
            left_tolerance_px: 6.0,
            preceding_siblings: 6,
            color_ancestor_levels: 5,
            color_scope_nodes: 20,
            class_ancestor_levels: 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub policy: Policy,
    pub limits: Limits,
}

impl ClassifierConfig {
    pub fn load(path: &Path) -> Result<ClassifierConfig> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("config not found: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config JSON: {}", path.display()))
    }
}
