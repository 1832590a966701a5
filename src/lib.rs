// ABOUTME: Root library module exposing all public modules
// ABOUTME: Provides config loading, runtime wiring and the protocol adapters

pub mod app;
pub mod config;
pub mod platform;

// Re-export the runtime crates for convenience
pub use aestas_agent::{AgentEvent, AgentHandle, AgentRegistry};
pub use aestas_core::{Bot, CommandRegistry, Orchestrator};
