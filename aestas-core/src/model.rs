// ABOUTME: Language Model Client contract
// ABOUTME: Produces reply contents plus a callback to run once the reply is delivered

use crate::bot::Bot;
use crate::content::{Content, Message};
use crate::domain::{noop_callback, ChatDomain, DeliveryCallback};
use crate::error::ModelError;
use async_trait::async_trait;

/// A successful model answer.
///
/// `on_delivered` is handed to `ChatDomain::send` together with `contents`.
pub struct ModelReply {
    pub contents: Vec<Content>,
    pub on_delivered: DeliveryCallback,
}

impl ModelReply {
    pub fn new(contents: Vec<Content>, on_delivered: DeliveryCallback) -> Self {
        Self {
            contents,
            on_delivered,
        }
    }

    /// A reply that needs no post-delivery bookkeeping
    pub fn without_callback(contents: Vec<Content>) -> Self {
        Self::new(contents, noop_callback())
    }
}

impl std::fmt::Debug for ModelReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelReply")
            .field("contents", &self.contents)
            .finish_non_exhaustive()
    }
}

/// What the model is asked to answer.
///
/// The bot has already run its instruction pipeline; `system_instruction` is
/// its output. `inbound` is the message being answered as the bot understood
/// it, which may differ from the domain's record (an escaped command prefix,
/// for one). Clients should prefer it over the recorded copy with the same id.
pub struct ModelRequest<'a> {
    pub bot: &'a Bot,
    pub domain: &'a dyn ChatDomain,
    pub system_instruction: Option<String>,
    pub inbound: Option<&'a Message>,
}

impl<'a> ModelRequest<'a> {
    pub fn new(bot: &'a Bot, domain: &'a dyn ChatDomain) -> Self {
        Self {
            bot,
            domain,
            system_instruction: None,
            inbound: None,
        }
    }

    pub fn with_system_instruction(mut self, instruction: Option<String>) -> Self {
        self.system_instruction = instruction;
        self
    }

    pub fn with_inbound(mut self, inbound: Option<&'a Message>) -> Self {
        self.inbound = inbound;
        self
    }
}

/// A pluggable model that answers in a domain on behalf of a bot.
///
/// Failures carry no callback, so there is nothing to run or leak when the
/// caller skips delivery. Implementations may suspend; the bot enforces its
/// timeout and cancellation by dropping the returned future.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    /// Name for logging and metrics
    fn name(&self) -> &str {
        "model"
    }

    async fn get_reply(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError>;
}
