// ABOUTME: Adapter registry that manages protocol adapter instances
// ABOUTME: Initializes adapters, attaches their domains to a bot and runs them until one stops

use aestas_core::{Bot, DomainInfo, Orchestrator, ProtocolAdapter};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Registry of all configured protocol adapters, keyed by `name()`
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProtocolAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter. A later adapter with the same name replaces the earlier one.
    pub fn register(&mut self, adapter: Arc<dyn ProtocolAdapter>) {
        let name = adapter.name().to_string();
        self.adapters.insert(name, adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProtocolAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Registered adapter names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn init_all(&self) -> Result<()> {
        for (name, adapter) in &self.adapters {
            adapter
                .init()
                .await
                .with_context(|| format!("Failed to initialize adapter {}", name))?;
            tracing::info!(adapter = %name, "Adapter initialized");
        }
        Ok(())
    }

    /// Domains of every adapter, as `(adapter name, domain)` sorted by adapter then id
    pub async fn domains(&self) -> Vec<(String, DomainInfo)> {
        let mut all = Vec::new();
        for name in self.names() {
            if let Some(adapter) = self.adapters.get(&name) {
                let mut domains = adapter.fetch_domains().await;
                domains.sort_by_key(|d| d.id);
                all.extend(domains.into_iter().map(|d| (name.clone(), d)));
            }
        }
        all
    }

    /// Build every adapter's domain views and attach them to `bot`
    pub async fn attach_domains(&self, bot: &Bot) -> Result<usize> {
        let mut attached = 0;
        for (name, info) in self.domains().await {
            let Some(adapter) = self.adapters.get(&name) else {
                continue;
            };
            let view = adapter
                .init_domain_view(bot, info.id)
                .await
                .with_context(|| format!("Adapter {} failed to open domain {}", name, info.id))?;
            if bot.attach_domain(view).is_some() {
                tracing::warn!(adapter = %name, domain = %info.id, "Domain id already attached, replaced");
            }
            attached += 1;
        }
        Ok(attached)
    }

    /// Run all adapters concurrently. When any adapter stops, the rest are asked to stop.
    pub async fn run_all(&self, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> Result<()> {
        let runs = self.adapters.iter().map(|(name, adapter)| {
            let orchestrator = Arc::clone(&orchestrator);
            let shutdown = shutdown.clone();
            async move {
                tracing::info!(adapter = %name, "Adapter running");
                let result = adapter.run(orchestrator, shutdown.clone()).await;
                shutdown.cancel();
                match &result {
                    Ok(()) => tracing::info!(adapter = %name, "Adapter stopped"),
                    Err(e) => tracing::error!(adapter = %name, error = %e, "Adapter failed"),
                }
                result.with_context(|| format!("Adapter {} failed", name))
            }
        });

        let results = futures_util::future::join_all(runs).await;
        results.into_iter().collect()
    }
}
