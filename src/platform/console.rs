// ABOUTME: Console protocol adapter - one virtual domain driven from a line-oriented terminal
// ABOUTME: Prints every message as `[#id] name: text`, handles :recall, :say and :quit

use aestas_core::{
    Bot, ChatDomain, ChatMember, Content, DomainId, DomainInfo, HandleResult, Message, MessageId,
    Orchestrator, ProtocolAdapter, VirtualDomain, VirtualDomainConfig, VirtualTransport,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::config::ConsoleConfig;

/// Where console output goes
pub type ConsoleOutput = Arc<Mutex<dyn Write + Send>>;

type ConsoleInput = Box<dyn AsyncBufRead + Send + Unpin>;

fn write_line(out: &ConsoleOutput, line: &str) -> std::io::Result<()> {
    let mut out = out.lock().unwrap_or_else(|e| e.into_inner());
    writeln!(out, "{}", line)?;
    out.flush()
}

fn format_message(message: &Message) -> String {
    format!("[#{}] {}: {}", message.id, message.sender.name, message.text())
}

/// One line typed at the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLine {
    /// Ordinary chat text from the user
    Chat(String),
    /// `:recall <id>`
    Recall(MessageId),
    /// `:say [text]`; no text lets the model speak
    Say(Option<String>),
    /// `:quit`
    Quit,
    /// Whitespace only
    Empty,
    /// A `:` directive that could not be understood
    Invalid(String),
}

impl ConsoleLine {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return ConsoleLine::Empty;
        }
        let Some(directive) = line.strip_prefix(':') else {
            return ConsoleLine::Chat(line.to_string());
        };

        let (name, rest) = match directive.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (directive, ""),
        };
        match name {
            "quit" | "q" => ConsoleLine::Quit,
            "say" if rest.is_empty() => ConsoleLine::Say(None),
            "say" => ConsoleLine::Say(Some(rest.to_string())),
            "recall" => match rest.parse::<u64>() {
                Ok(id) if id > 0 => ConsoleLine::Recall(MessageId(id)),
                _ => ConsoleLine::Invalid("usage: :recall <message id>".to_string()),
            },
            other => ConsoleLine::Invalid(format!("unknown directive :{}", other)),
        }
    }
}

/// Displays delivered and recalled messages on the console output
pub struct ConsoleTransport {
    out: ConsoleOutput,
}

impl ConsoleTransport {
    pub fn new(out: ConsoleOutput) -> Self {
        Self { out }
    }
}

impl VirtualTransport for ConsoleTransport {
    fn deliver(&self, message: &Message) -> Result<(), String> {
        write_line(&self.out, &format_message(message)).map_err(|e| e.to_string())
    }

    fn retract(&self, id: MessageId) -> Result<(), String> {
        write_line(&self.out, &format!("[#{} recalled]", id)).map_err(|e| e.to_string())
    }
}

/// Headless adapter exposing one configured virtual domain
pub struct ConsoleAdapter {
    config: ConsoleConfig,
    input: tokio::sync::Mutex<Option<ConsoleInput>>,
    output: ConsoleOutput,
    domain: Mutex<Option<Arc<VirtualDomain>>>,
}

impl ConsoleAdapter {
    pub fn new<R>(config: ConsoleConfig, input: R, output: ConsoleOutput) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        Self {
            config,
            input: tokio::sync::Mutex::new(Some(Box::new(input))),
            output,
            domain: Mutex::new(None),
        }
    }

    /// Adapter reading stdin and writing stdout
    pub fn stdio(config: ConsoleConfig) -> Self {
        let output: ConsoleOutput = Arc::new(Mutex::new(std::io::stdout()));
        Self::new(config, BufReader::new(tokio::io::stdin()), output)
    }

    fn domain_id(&self) -> DomainId {
        DomainId(self.config.domain_id)
    }

    /// The console's domain, created on first use
    fn view(&self, bot: &Bot) -> Arc<VirtualDomain> {
        let mut slot = self.domain.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(domain) = slot.as_ref() {
            return Arc::clone(domain);
        }

        let config = VirtualDomainConfig::new(
            self.config.domain_id,
            self.config.domain_name.clone(),
            ChatMember::new(self.config.bot_member_id, bot.name()),
            ChatMember::new(self.config.user_id, self.config.user_name.clone()),
        )
        .private(self.config.private)
        .history_limit(self.config.history_limit);
        let transport = Arc::new(ConsoleTransport::new(Arc::clone(&self.output)));
        let domain = Arc::new(VirtualDomain::new(config, transport));
        *slot = Some(Arc::clone(&domain));
        domain
    }

    fn note(&self, text: &str) {
        if let Err(e) = write_line(&self.output, &format!("[{}]", text)) {
            tracing::warn!(error = %e, "Failed to write to console");
        }
    }

    async fn handle_line(&self, orchestrator: &Orchestrator, domain: &VirtualDomain, line: ConsoleLine) {
        let bot = orchestrator.bot();
        match line {
            ConsoleLine::Empty | ConsoleLine::Quit => {}
            ConsoleLine::Invalid(usage) => self.note(&usage),
            ConsoleLine::Recall(id) => {
                if let Err(e) = bot.recall(domain, id).await {
                    self.note(&format!("error: {}", e));
                }
            }
            ConsoleLine::Say(text) => {
                let contents = text.map(|t| vec![Content::text(t)]);
                if let Err(e) = bot.self_talk(domain, contents).await {
                    self.note(&format!("error: {}", e));
                }
            }
            ConsoleLine::Chat(text) => {
                let contents = vec![Content::text(text)];
                let (result, id) = domain.input(contents.clone());
                if let Err(e) = result {
                    self.note(&format!("error: {}", e));
                    return;
                }
                let message = Message::new(contents, domain.peer().clone(), id);
                // Shown with its id so the user can :recall it
                if let Err(e) = write_line(&self.output, &format_message(&message)) {
                    tracing::warn!(error = %e, "Failed to write to console");
                }
                if let HandleResult::Error(e) = orchestrator.handle_message(domain, &message).await {
                    self.note(&format!("error: {}", e));
                }
            }
        }
    }
}

#[async_trait]
impl ProtocolAdapter for ConsoleAdapter {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn run(&self, orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> Result<()> {
        let input = self
            .input
            .lock()
            .await
            .take()
            .context("Console input already consumed by an earlier run")?;
        let domain = self.view(orchestrator.bot());
        let mut lines = input.lines();

        tracing::info!(domain = %domain.id(), name = %domain.name(), "Console ready");
        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => break,
                line = lines.next_line() => line.context("Failed to read console input")?,
            };
            let Some(line) = line else {
                break;
            };

            let line = ConsoleLine::parse(&line);
            if line == ConsoleLine::Quit {
                break;
            }
            self.handle_line(&orchestrator, &domain, line).await;
        }
        Ok(())
    }

    async fn fetch_domains(&self) -> Vec<DomainInfo> {
        vec![DomainInfo::new(
            self.domain_id(),
            self.config.domain_name.clone(),
            self.config.private,
        )]
    }

    async fn init_domain_view(&self, bot: &Bot, id: DomainId) -> Result<Arc<dyn ChatDomain>> {
        if id != self.domain_id() {
            anyhow::bail!("Unknown console domain: {}", id);
        }
        let domain: Arc<dyn ChatDomain> = self.view(bot);
        Ok(domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_and_empty() {
        assert_eq!(ConsoleLine::parse("  hi there "), ConsoleLine::Chat("hi there".into()));
        assert_eq!(ConsoleLine::parse("/Info"), ConsoleLine::Chat("/Info".into()));
        assert_eq!(ConsoleLine::parse("   "), ConsoleLine::Empty);
    }

    #[test]
    fn test_parse_directives() {
        assert_eq!(ConsoleLine::parse(":quit"), ConsoleLine::Quit);
        assert_eq!(ConsoleLine::parse(":q"), ConsoleLine::Quit);
        assert_eq!(ConsoleLine::parse(":recall 12"), ConsoleLine::Recall(MessageId(12)));
        assert_eq!(ConsoleLine::parse(":say"), ConsoleLine::Say(None));
        assert_eq!(
            ConsoleLine::parse(":say  good night "),
            ConsoleLine::Say(Some("good night".into()))
        );
    }

    #[test]
    fn test_parse_invalid_directives() {
        assert!(matches!(ConsoleLine::parse(":recall"), ConsoleLine::Invalid(_)));
        assert!(matches!(ConsoleLine::parse(":recall x"), ConsoleLine::Invalid(_)));
        assert!(matches!(ConsoleLine::parse(":recall 0"), ConsoleLine::Invalid(_)));
        assert!(matches!(ConsoleLine::parse(":dance"), ConsoleLine::Invalid(_)));
    }

    #[test]
    fn test_transport_formats_lines() {
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        let transport = ConsoleTransport::new(buf.clone());
        let message = Message::new(
            vec![Content::text("hello")],
            ChatMember::new(0, "aestas"),
            MessageId(3),
        );
        transport.deliver(&message).unwrap();
        transport.retract(MessageId(3)).unwrap();

        let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert_eq!(out, "[#3] aestas: hello\n[#3 recalled]\n");
    }
}
