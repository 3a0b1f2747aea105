//! Engine configuration
//!
//! Loaded from TOML by the host, or constructed with defaults. The prompt
//! truncation limit is deliberately a configuration value rather than a
//! constant so hosts can tune it per deployment.

use serde::{Deserialize, Serialize};

fn default_base_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_prompt_limit() -> usize {
    4000
}

fn default_truncation_marker() -> String {
    "…[truncated]".to_string()
}

/// Configuration for the copilot engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the session/chat backend (no trailing slash)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Maximum number of chars of editor text carried in a prompt context
    #[serde(default = "default_prompt_limit")]
    pub prompt_truncation_limit: usize,
    /// Marker appended when draft text is truncated
    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,
    /// Model override passed through on sends, if any
    #[serde(default)]
    pub default_model: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            prompt_truncation_limit: default_prompt_limit(),
            truncation_marker: default_truncation_marker(),
            default_model: None,
        }
    }
}

impl EngineConfig {
    /// Parse from TOML, falling back to defaults for missing keys.
    pub fn from_toml_str(content: &str) -> Self {
        toml::from_str(content).unwrap_or_default()
    }
}
