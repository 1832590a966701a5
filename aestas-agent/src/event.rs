// ABOUTME: What a backend streams back for one prompt: chunks, then exactly one outcome.
// ABOUTME: Failures carry a kind so callers can tell cancellation and rate limits apart.

use std::fmt;

/// One step of a prompt's output stream
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Partial reply text, in order
    Chunk(String),
    /// The prompt finished; `text` is the backend's own view of the full reply
    Done { text: String, usage: Option<Usage> },
    /// The prompt ended without a reply
    Failed(Failure),
}

impl AgentEvent {
    pub fn done(text: impl Into<String>) -> Self {
        AgentEvent::Done {
            text: text.into(),
            usage: None,
        }
    }

    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        AgentEvent::Failed(Failure::new(kind, message))
    }

    /// True for events that end a prompt's stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AgentEvent::Chunk(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Withdrawn through `AgentHandle::cancel`
    Cancelled,
    Timeout,
    RateLimited,
    AuthFailed,
    /// Anything else the backend reported
    Backend,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::Cancelled => "cancelled",
            FailureKind::Timeout => "timed out",
            FailureKind::RateLimited => "rate limited",
            FailureKind::AuthFailed => "authentication failed",
            FailureKind::Backend => "backend error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Rough token accounting, when a backend can tell
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
