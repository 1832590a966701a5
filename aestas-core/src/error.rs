// ABOUTME: Typed error taxonomy for domains, models, bots and commands
// ABOUTME: Every failure is a value; nothing here is meant to unwind across an await

use crate::commands::{AccessibleDomain, Privilege};
use crate::content::MessageId;
use crate::domain::DomainKind;
use std::time::Duration;
use thiserror::Error;

/// Failures of a chat domain's send/recall capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("unknown message: #{0}")]
    UnknownMessage(MessageId),
}

impl DomainError {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Transport(_) => "TransportFailure",
            DomainError::UnknownMessage(_) => "UnknownMessage",
        }
    }
}

/// Failures of a language model client
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("model produced an empty reply")]
    EmptyReply,

    #[error("model timed out after {0:?}")]
    Timeout(Duration),

    #[error("model call cancelled")]
    Cancelled,
}

impl ModelError {
    pub fn kind(&self) -> &'static str {
        "ModelFailure"
    }
}

/// Failures of the bot's Reply/SelfTalk/Recall operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotError {
    #[error("bot is missing required configuration: {0}")]
    ConfigurationMissing(&'static str),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("system instruction stage {stage} failed: {message}")]
    Instruction { stage: usize, message: String },
}

impl BotError {
    pub fn kind(&self) -> &'static str {
        match self {
            BotError::ConfigurationMissing(_) => "ConfigurationMissing",
            BotError::Model(e) => e.kind(),
            BotError::Domain(e) => e.kind(),
            BotError::Instruction { .. } => "ModelFailure",
        }
    }
}

/// Failures of command registration and dispatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    NotFound(String),

    #[error("Command {command} is only available in {allowed:?} domains, not {actual:?}")]
    Forbidden {
        command: String,
        allowed: AccessibleDomain,
        actual: DomainKind,
    },

    #[error("Command {command} requires {required:?} privilege, caller has {actual:?}")]
    InsufficientPrivilege {
        command: String,
        required: Privilege,
        actual: Privilege,
    },

    #[error("A command named {0} is already registered")]
    DuplicateName(String),
}

impl CommandError {
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::NotFound(_) => "CommandNotFound",
            CommandError::Forbidden { .. } => "CommandForbidden",
            CommandError::InsufficientPrivilege { .. } => "CommandPrivilegeDenied",
            CommandError::DuplicateName(_) => "CommandDuplicate",
        }
    }
}
