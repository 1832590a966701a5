// ABOUTME: Backend configuration for aestas-agent.
// ABOUTME: A `type` discriminator plus free-form keys handed to the backend factory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Backend configuration with type discriminator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend type: "echo", "command", "mock", etc.
    #[serde(rename = "type")]
    pub backend_type: String,

    /// Remaining fields passed to backend factory
    #[serde(flatten)]
    pub config: toml::Table,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: "echo".to_string(),
            config: toml::Table::new(),
        }
    }
}

impl BackendConfig {
    /// Parse a standalone `[backend]`-less TOML fragment, e.g. `type = "echo"`
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse backend config TOML")
    }

    /// Get backend type name
    pub fn backend_type(&self) -> &str {
        &self.backend_type
    }

    /// Convert config table to serde_json::Value for registry
    pub fn to_json_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(&self.config).context("Backend config is not representable as JSON")
    }
}
