// ABOUTME: Platform-agnostic reply/recall orchestration for chat bots
// ABOUTME: Provides the domain, model and command contracts plus the Bot that ties them together

pub mod adapter;
pub mod agent_client;
pub mod bot;
pub mod commands;
pub mod content;
pub mod domain;
pub mod error;
pub mod instruction;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod virtual_domain;

pub use adapter::{DomainInfo, ProtocolAdapter};
pub use agent_client::AgentModelClient;
pub use bot::{Bot, PrefixBuilder, Reply};
pub use commands::{
    AccessibleDomain, Atom, Command, CommandEnvironment, CommandRegistry, CommandSummary,
    Privilege,
};
pub use content::{ChatMember, Content, DomainId, Message, MessageId};
pub use domain::{noop_callback, ChatDomain, DeliveryCallback, DomainKind};
pub use error::{BotError, CommandError, DomainError, ModelError};
pub use instruction::InstructionPipeline;
pub use model::{LanguageModelClient, ModelReply, ModelRequest};
pub use orchestrator::{HandleResult, Orchestrator, OrchestratorConfig};
pub use virtual_domain::{DeliveryMode, VirtualDomain, VirtualDomainConfig, VirtualTransport};

// Re-export aestas-agent types used at the model seam
pub use aestas_agent::{AgentEvent, AgentHandle, AgentRegistry};
