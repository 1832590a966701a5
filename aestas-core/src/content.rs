// ABOUTME: Immutable value types for message payloads and envelopes
// ABOUTME: Content units, chat members, message ids and the Message envelope

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a conversation surface, assigned by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainId(pub u32);

impl fmt::Display for DomainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-assigned message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Placeholder id of an envelope that has not been delivered yet
    pub const PENDING: MessageId = MessageId(0);

    pub fn is_pending(&self) -> bool {
        *self == Self::PENDING
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One irreducible piece of a message payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Content {
    /// Plain text
    Text(String),
    /// Image reference
    Image { url: String, mime_type: String },
    /// File reference
    File { name: String, url: String },
    /// Mention of a chat member
    Mention { member_id: u32 },
    /// Quote of an earlier message
    Quote { message_id: MessageId },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// The text of a `Text` unit
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Render a sequence of units as one line of plain text
    pub fn render_all(contents: &[Content]) -> String {
        contents
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Text(text) => f.write_str(text),
            Content::Image { url, .. } => write!(f, "[image: {}]", url),
            Content::File { name, .. } => write!(f, "[file: {}]", name),
            Content::Mention { member_id } => write!(f, "@{}", member_id),
            Content::Quote { message_id } => write!(f, "[quote #{}]", message_id),
        }
    }
}

/// A participant (bot or human) inside a domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMember {
    pub id: u32,
    pub name: String,
}

impl ChatMember {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A message envelope. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub contents: Vec<Content>,
    pub sender: ChatMember,
    pub id: MessageId,
}

impl Message {
    pub fn new(contents: Vec<Content>, sender: ChatMember, id: MessageId) -> Self {
        Self {
            contents,
            sender,
            id,
        }
    }

    /// Plain-text rendering of the body
    pub fn text(&self) -> String {
        Content::render_all(&self.contents)
    }

    /// True when the body carries nothing but whitespace text
    pub fn is_blank(&self) -> bool {
        self.contents
            .iter()
            .all(|c| c.as_text().is_some_and(|t| t.trim().is_empty()))
    }
}
