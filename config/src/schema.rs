//! Typed runtime configuration schema (spec §6.4). Deserialized from a TOML document;
//! every field defaults to the value the spec names so a missing file yields a runnable config.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("read config file: {0}")]
    Read(std::io::Error),
    #[error("parse config toml: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentConfig {
    pub name: String,
    pub description: String,
    pub label: String,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GlobalPolicy {
    #[serde(rename = "type")]
    pub policy_type: String,
    pub priority: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub uri: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterNormalizationConfig {
    pub min_substring_length: usize,
    pub similarity_ratio: f64,
}

impl Default for ParameterNormalizationConfig {
    fn default() -> Self {
        Self {
            min_substring_length: 4,
            similarity_ratio: 0.3,
        }
    }
}

fn default_idle_timeout_seconds() -> u64 {
    900
}

fn default_turn_timeout_seconds() -> u64 {
    60
}

fn default_max_reconnect_backoff_seconds() -> u64 {
    30
}

fn default_interactive_token() -> String {
    "#INT#".to_string()
}

/// Top-level Morgana runtime configuration (spec §6.4).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorganaConfig {
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u64,
    #[serde(default = "default_turn_timeout_seconds")]
    pub turn_timeout_seconds: u64,
    #[serde(default = "default_max_reconnect_backoff_seconds")]
    pub max_reconnect_backoff_seconds: u64,
    pub intents: Vec<IntentConfig>,
    pub prompts: std::collections::BTreeMap<String, String>,
    pub global_policies: Vec<GlobalPolicy>,
    pub mcp_servers: Vec<McpServerConfig>,
    pub parameter_normalization: ParameterNormalizationConfig,
    pub profanity_terms: Vec<String>,
    #[serde(default = "default_interactive_token")]
    pub interactive_token: String,
}

impl Default for MorganaConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout_seconds(),
            turn_timeout_seconds: default_turn_timeout_seconds(),
            max_reconnect_backoff_seconds: default_max_reconnect_backoff_seconds(),
            intents: Vec::new(),
            prompts: std::collections::BTreeMap::new(),
            global_policies: Vec::new(),
            mcp_servers: Vec::new(),
            parameter_normalization: ParameterNormalizationConfig::default(),
            profanity_terms: Vec::new(),
            interactive_token: default_interactive_token(),
        }
    }
}

impl MorganaConfig {
    /// Loads config from a TOML file if `path` is given and exists; otherwise returns defaults.
    /// Mirrors `load_and_apply`'s fail-soft posture: an absent file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, LoadError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(LoadError::Read)?;
        let cfg: MorganaConfig = toml::from_str(&content)?;
        Ok(cfg)
    }

    /// Ordered global policies (spec §6.4: "ordered by `{type, priority}`").
    pub fn ordered_policies(&self) -> Vec<&GlobalPolicy> {
        let mut v: Vec<&GlobalPolicy> = self.global_policies.iter().collect();
        v.sort_by(|a, b| a.policy_type.cmp(&b.policy_type).then(a.priority.cmp(&b.priority)));
        v
    }
}
