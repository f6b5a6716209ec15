//! Engine Configuration
//!
//! Tunables for the recompute and validation passes and the formula
//! sandbox. Every key has a default, so an empty JSON object is a valid
//! config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Treat a parent holding an empty string or empty list as unset, so the
    /// derived field goes back to pending when an input is cleared.
    pub blank_parent_is_pending: bool,

    /// Whitespace-only text fails the `required` rule.
    pub trim_required: bool,

    pub formula: FormulaLimits,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blank_parent_is_pending: true,
            trim_required: true,
            formula: FormulaLimits::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Sandbox limits applied when a formula is compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FormulaLimits {
    /// Longest formula source accepted, in bytes.
    pub max_source_len: usize,

    /// Deepest expression nesting accepted.
    pub max_depth: usize,
}

impl Default for FormulaLimits {
    fn default() -> Self {
        Self {
            max_source_len: 4096,
            max_depth: 64,
        }
    }
}
