// ABOUTME: Named backend factories; the `[backend] type` key picks one at startup.
// ABOUTME: Built-ins are command, echo and mock; hosts may add their own.

use crate::config::BackendConfig;
use crate::handle::AgentHandle;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;

/// Builds a running backend from its free-form config keys
pub type BackendFactory = Box<dyn Fn(&Value) -> Result<AgentHandle> + Send + Sync>;

pub struct AgentRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl AgentRegistry {
    /// A registry without any backends
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// The command, echo and mock backends
    pub fn with_builtins() -> Self {
        use crate::backends::{command::CommandBackend, echo::EchoBackend, mock::MockBackend};

        Self::empty()
            .with_backend("command", CommandBackend::factory())
            .with_backend("echo", EchoBackend::factory())
            .with_backend("mock", MockBackend::factory())
    }

    /// Add or replace the factory for `name`
    pub fn with_backend<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<AgentHandle> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Backend names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Start the backend `name`. Needs a tokio runtime: the worker is spawned here.
    pub fn create(&self, name: &str, config: &Value) -> Result<AgentHandle> {
        let Some(factory) = self.factories.get(name) else {
            anyhow::bail!(
                "Unknown backend `{}` (available: {})",
                name,
                self.names().join(", ")
            );
        };
        tracing::debug!(backend = %name, "Starting model backend");
        factory(config).with_context(|| format!("Failed to start `{}` backend", name))
    }

    pub fn create_from_config(&self, config: &BackendConfig) -> Result<AgentHandle> {
        self.create(config.backend_type(), &config.to_json_value()?)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
