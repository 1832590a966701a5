// ABOUTME: Pluggable language-model backend layer for aestas.
// ABOUTME: Channel-backed Send+Sync handles over backends (command, echo, mock), one stream per prompt.

pub mod config;
pub mod event;
pub mod handle;
pub mod registry;

pub mod backends;

pub use event::{AgentEvent, Failure, FailureKind, Usage};
pub use handle::{AgentHandle, CancelTarget, ConversationId, PromptId, PromptStream};
pub use registry::{AgentRegistry, BackendFactory};
