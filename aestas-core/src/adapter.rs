// ABOUTME: Protocol adapter contract - connects a chat protocol to the runtime
// ABOUTME: Adapters own their domains and feed inbound messages to an Orchestrator

use crate::bot::Bot;
use crate::content::DomainId;
use crate::domain::ChatDomain;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A domain an adapter can expose
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub name: String,
    pub id: DomainId,
    pub is_private: bool,
}

impl DomainInfo {
    pub fn new(id: DomainId, name: impl Into<String>, is_private: bool) -> Self {
        Self {
            name: name.into(),
            id,
            is_private,
        }
    }
}

/// A chat protocol implementation.
///
/// Lifecycle: `init` once, then `init_domain_view` for every domain the bot
/// should attach to, then `run` until it returns or `shutdown` fires.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Stable adapter identifier (e.g. "console")
    fn name(&self) -> &'static str;

    /// Prepare connections and local state
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    /// Drive the protocol, routing inbound messages through `orchestrator`
    async fn run(&self, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> Result<()>;

    /// Domains this adapter can expose
    async fn fetch_domains(&self) -> Vec<DomainInfo>;

    /// Build the domain view for `id`, bound to `bot`
    async fn init_domain_view(&self, bot: &Bot, id: DomainId) -> Result<Arc<dyn ChatDomain>>;
}
