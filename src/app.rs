// ABOUTME: Runtime wiring - builds the bot, commands and orchestrator from Config
// ABOUTME: Shared by the binary and integration tests so both start the same way

use crate::config::{Config, MetricsConfig};
use crate::platform::AdapterRegistry;
use aestas_agent::AgentRegistry;
use aestas_core::{AgentModelClient, Bot, CommandRegistry, LanguageModelClient, Orchestrator};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Create the bot with its model backend and instruction pipeline
pub fn build_bot(config: &Config, agents: &AgentRegistry) -> Result<Arc<Bot>> {
    let handle = agents.create_from_config(&config.backend)?;

    let bot = Bot::new(config.bot.name.clone());
    let model: Arc<dyn LanguageModelClient> = Arc::new(AgentModelClient::new(handle));
    bot.set_model(Some(model));
    bot.set_reply_timeout(config.reply_timeout());
    bot.set_system_instruction_builder(config.instruction_pipeline());

    tracing::info!(
        bot = %config.bot.name,
        backend = %config.backend.backend_type(),
        timeout_secs = config.bot.reply_timeout_secs,
        "Bot configured"
    );
    Ok(Arc::new(bot))
}

/// Commands available to chat users
pub fn build_commands() -> CommandRegistry {
    CommandRegistry::with_builtins()
}

/// Install the Prometheus exporter when an address is configured
pub fn install_metrics(config: &MetricsConfig) -> Result<()> {
    let Some(addr) = config.prometheus_addr.as_deref() else {
        return Ok(());
    };
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("metrics.prometheus_addr must be host:port, got: {}", addr))?;
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(%addr, "Prometheus metrics exporter listening");
    Ok(())
}

/// A started runtime: adapters initialized and their domains attached
pub struct Runtime {
    pub bot: Arc<Bot>,
    pub orchestrator: Arc<Orchestrator>,
    pub adapters: AdapterRegistry,
}

impl Runtime {
    pub async fn start(config: &Config, agents: &AgentRegistry, adapters: AdapterRegistry) -> Result<Self> {
        let bot = build_bot(config, agents)?;
        adapters.init_all().await?;
        let attached = adapters.attach_domains(&bot).await?;
        tracing::info!(adapters = adapters.len(), domains = attached, "Domains attached");

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&bot),
            Arc::new(build_commands()),
            config.orchestrator_config(),
        ));
        Ok(Self {
            bot,
            orchestrator,
            adapters,
        })
    }

    /// Run every adapter until one stops or `shutdown` fires
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        self.adapters
            .run_all(Arc::clone(&self.orchestrator), shutdown)
            .await
    }
}
