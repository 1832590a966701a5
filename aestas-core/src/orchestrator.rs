// ABOUTME: Core message orchestration - routes inbound messages to commands or the bot
// ABOUTME: Protocol-agnostic; adapters call handle_message for every message they receive

use crate::bot::Bot;
use crate::commands::{
    parse::DEFAULT_PREFIX, parse_message, CommandEnvironment, CommandLine, CommandRegistry,
    ParseResult, Privilege,
};
use crate::content::{Content, Message};
use crate::domain::{ChatDomain, DomainKind};
use std::sync::{Arc, Mutex};

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Command prefix (e.g., "/")
    pub command_prefix: String,
    /// Member ids granted `Owner` privilege
    pub owners: Vec<u32>,
    /// Member ids granted `Elevated` privilege
    pub elevated: Vec<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            command_prefix: DEFAULT_PREFIX.to_string(),
            owners: Vec::new(),
            elevated: Vec::new(),
        }
    }
}

impl OrchestratorConfig {
    pub fn privilege_of(&self, member_id: u32) -> Privilege {
        if self.owners.contains(&member_id) {
            Privilege::Owner
        } else if self.elevated.contains(&member_id) {
            Privilege::Elevated
        } else {
            Privilege::Normal
        }
    }
}

/// Result of handling a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// Message was handled, response sent
    Handled,
    /// Message was ignored (our own, empty, escape only)
    Ignored,
    /// Error occurred during handling
    Error(String),
}

/// Orchestrates message handling between a domain, the command layer and the bot
pub struct Orchestrator {
    bot: Arc<Bot>,
    commands: Arc<CommandRegistry>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(bot: Arc<Bot>, commands: Arc<CommandRegistry>, config: OrchestratorConfig) -> Self {
        Self {
            bot,
            commands,
            config,
        }
    }

    pub fn bot(&self) -> &Arc<Bot> {
        &self.bot
    }

    pub fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Handle an incoming message
    pub async fn handle_message(&self, domain: &dyn ChatDomain, message: &Message) -> HandleResult {
        // Skip our own messages
        if message.sender.id == domain.self_member().id {
            return HandleResult::Ignored;
        }
        if message.is_blank() {
            return HandleResult::Ignored;
        }

        let body = message.text();
        match parse_message(&body, &self.config.command_prefix) {
            ParseResult::Ignore => HandleResult::Ignored,
            ParseResult::Command(cmd) => self.handle_command(domain, message, cmd).await,
            ParseResult::Message(text) if text == body.trim() => {
                self.handle_chat_message(domain, message).await
            }
            ParseResult::Message(text) => {
                // Escaped prefix: the model answers the text without it
                let unescaped =
                    Message::new(vec![Content::text(text)], message.sender.clone(), message.id);
                self.handle_chat_message(domain, &unescaped).await
            }
        }
    }

    /// Handle a parsed command
    async fn handle_command(
        &self,
        domain: &dyn ChatDomain,
        message: &Message,
        cmd: CommandLine,
    ) -> HandleResult {
        let accessibility = DomainKind::from_private(domain.is_private());
        let privilege = self.config.privilege_of(message.sender.id);
        let catalog = self
            .commands
            .summaries()
            .into_iter()
            .filter(|s| s.accessible_domain.admits(accessibility) && privilege >= s.privilege)
            .collect();

        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let env = CommandEnvironment::new(accessibility, privilege, move |line| {
            sink.lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(line.to_string());
        })
        .with_catalog(catalog);

        tracing::info!(
            domain = %domain.id(),
            sender = %message.sender.name,
            command = %cmd.name,
            "Dispatching command"
        );

        let (output, result) = match self.commands.dispatch(&cmd.name, &cmd.atoms(), &env).await {
            Ok(atom) => {
                let mut output = std::mem::take(&mut *lines.lock().unwrap_or_else(|e| e.into_inner()));
                if !atom.is_unit() {
                    output.push(atom.to_string());
                }
                (output, HandleResult::Handled)
            }
            Err(e) => (vec![e.to_string()], HandleResult::Error(e.to_string())),
        };

        if !output.is_empty() {
            let contents = vec![Content::text(output.join("\n"))];
            if let Err(e) = self.bot.self_talk(domain, Some(contents)).await {
                tracing::warn!(command = %cmd.name, error = %e, "Failed to send command output");
                return HandleResult::Error(e.to_string());
            }
        }
        result
    }

    /// Handle a message that should go to the model
    async fn handle_chat_message(&self, domain: &dyn ChatDomain, message: &Message) -> HandleResult {
        match self.bot.respond(domain, message).await {
            Ok(id) => {
                tracing::info!(domain = %domain.id(), reply = %id, "Replied");
                HandleResult::Handled
            }
            Err(e) => {
                tracing::error!(domain = %domain.id(), kind = e.kind(), error = %e, "Reply failed");
                HandleResult::Error(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("bot", &self.bot.name())
            .field("commands", &self.commands)
            .field("config", &self.config)
            .finish()
    }
}
