// ABOUTME: Chat Domain contract - one conversation surface on any transport
// ABOUTME: Send with a delivery callback, recall by id, membership and privacy

use crate::content::{ChatMember, Content, DomainId, Message, MessageId};
use crate::error::DomainError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Invoked once a sent message is confirmed delivered, with the created message
pub type DeliveryCallback = Box<dyn FnOnce(&Message) + Send>;

/// A delivery callback that does nothing
pub fn noop_callback() -> DeliveryCallback {
    Box::new(|_| {})
}

/// Kind of conversation surface, used for command accessibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainKind {
    /// Direct, one-to-one conversation
    Private,
    /// Channel or group conversation
    Group,
}

impl DomainKind {
    pub fn from_private(is_private: bool) -> Self {
        if is_private {
            DomainKind::Private
        } else {
            DomainKind::Group
        }
    }
}

/// A conversation surface (channel, DM) the bot can talk into.
///
/// Implementations must report ordinary failures through `DomainError` and
/// must invoke a delivery callback at most once, and never after a failed send.
#[async_trait]
pub trait ChatDomain: Send + Sync {
    /// Transport-assigned identifier
    fn id(&self) -> DomainId;

    /// Human-readable name
    fn name(&self) -> &str;

    /// Whether this is a private (direct) conversation
    fn is_private(&self) -> bool;

    /// The bot's own membership in this domain
    fn self_member(&self) -> &ChatMember;

    /// The counterpart the bot talks to
    fn peer(&self) -> &ChatMember;

    /// Send contents; on success `on_delivered` runs with the created message
    async fn send(
        &self,
        on_delivered: DeliveryCallback,
        contents: Vec<Content>,
    ) -> Result<MessageId, DomainError>;

    /// Retract a previously delivered message
    async fn recall(&self, id: MessageId) -> Result<(), DomainError>;

    /// Recent messages, oldest first
    async fn history(&self) -> Vec<Message> {
        Vec::new()
    }

    fn kind(&self) -> DomainKind {
        DomainKind::from_private(self.is_private())
    }
}
