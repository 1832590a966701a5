// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates required fields and provides sensible defaults for optional ones
use aestas_agent::config::BackendConfig;
use aestas_core::{InstructionPipeline, OrchestratorConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "aestas.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Member ids with owner privilege
    #[serde(default)]
    pub owners: Vec<u32>,
    /// Member ids with elevated privilege
    #[serde(default)]
    pub elevated: Vec<u32>,
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    /// Extra instruction lines appended after `system_instruction`
    #[serde(default)]
    pub persona: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_domain_id")]
    pub domain_id: u32,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default = "default_private")]
    pub private: bool,
    #[serde(default = "default_bot_member_id")]
    pub bot_member_id: u32,
    #[serde(default = "default_user_id")]
    pub user_id: u32,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Address for the Prometheus scrape endpoint, e.g. "127.0.0.1:9000"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prometheus_addr: Option<String>,
}

fn default_bot_name() -> String {
    "aestas".to_string()
}

fn default_command_prefix() -> String {
    aestas_core::commands::parse::DEFAULT_PREFIX.to_string()
}

fn default_reply_timeout_secs() -> u64 {
    60
}

fn default_domain_id() -> u32 {
    1
}

fn default_domain_name() -> String {
    "console".to_string()
}

fn default_private() -> bool {
    true
}

fn default_bot_member_id() -> u32 {
    0
}

fn default_user_id() -> u32 {
    1
}

fn default_user_name() -> String {
    "you".to_string()
}

fn default_history_limit() -> usize {
    64
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            command_prefix: default_command_prefix(),
            owners: Vec::new(),
            elevated: Vec::new(),
            reply_timeout_secs: default_reply_timeout_secs(),
            system_instruction: None,
            persona: Vec::new(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            domain_id: default_domain_id(),
            domain_name: default_domain_name(),
            private: default_private(),
            bot_member_id: default_bot_member_id(),
            user_id: default_user_id(),
            user_name: default_user_name(),
            history_limit: default_history_limit(),
        }
    }
}

fn parse_ids(var: &str, val: &str) -> Result<Vec<u32>> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .with_context(|| format!("{} must be comma separated member ids, got: {}", var, val))
        })
        .collect()
}

impl Config {
    /// Load configuration from `path` (if it exists) with environment variable overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Config::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str::<Config>(content)?)
    }

    /// Override fields from AESTAS_* environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("AESTAS_BOT_NAME") {
            self.bot.name = val;
        }
        if let Ok(val) = std::env::var("AESTAS_COMMAND_PREFIX") {
            self.bot.command_prefix = val;
        }
        if let Ok(val) = std::env::var("AESTAS_OWNERS") {
            self.bot.owners = parse_ids("AESTAS_OWNERS", &val)?;
        }
        if let Ok(val) = std::env::var("AESTAS_REPLY_TIMEOUT_SECS") {
            self.bot.reply_timeout_secs = val.parse().with_context(|| {
                format!("AESTAS_REPLY_TIMEOUT_SECS must be a number of seconds, got: {}", val)
            })?;
        }
        if let Ok(val) = std::env::var("AESTAS_BACKEND") {
            if val != self.backend.backend_type {
                // Keys of the file's backend belong to another type
                self.backend = BackendConfig {
                    backend_type: val,
                    config: toml::Table::new(),
                };
            }
        }
        if let Ok(val) = std::env::var("AESTAS_METRICS_ADDR") {
            self.metrics.prometheus_addr = Some(val).filter(|s| !s.trim().is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.bot.name.trim().is_empty() {
            anyhow::bail!("bot.name is required (set in aestas.toml or AESTAS_BOT_NAME env var)");
        }
        if self.bot.command_prefix.trim().is_empty() {
            anyhow::bail!(
                "bot.command_prefix must not be empty (set in aestas.toml or AESTAS_COMMAND_PREFIX env var)"
            );
        }
        if self.bot.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("bot.command_prefix must not contain whitespace");
        }
        if self.bot.reply_timeout_secs == 0 {
            anyhow::bail!("bot.reply_timeout_secs must be greater than zero");
        }
        if self.backend.backend_type.trim().is_empty() {
            anyhow::bail!("backend.type is required");
        }
        if self.console.user_id == self.console.bot_member_id {
            anyhow::bail!("console.user_id and console.bot_member_id must differ");
        }
        Ok(())
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.bot.reply_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            command_prefix: self.bot.command_prefix.clone(),
            owners: self.bot.owners.clone(),
            elevated: self.bot.elevated.clone(),
        }
    }

    /// System instruction pipeline, or `None` when nothing is configured
    pub fn instruction_pipeline(&self) -> Option<InstructionPipeline> {
        let base = self
            .bot
            .system_instruction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if base.is_none() && self.bot.persona.is_empty() {
            return None;
        }

        let mut pipeline = InstructionPipeline::new();
        if let Some(base) = base {
            pipeline = pipeline.line(base);
        }
        for line in &self.bot.persona {
            pipeline = pipeline.line(line.clone());
        }
        Some(pipeline)
    }
}
