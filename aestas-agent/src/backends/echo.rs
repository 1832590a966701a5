// ABOUTME: Echo backend - answers every prompt by repeating the latest utterance.
// ABOUTME: Offline default so the runtime works end to end without a real model.

use crate::event::{AgentEvent, FailureKind, Usage};
use crate::handle::{AgentHandle, ConversationId, Request};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Configuration for the echo backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EchoConfig {
    /// Text prepended to every reply
    #[serde(default)]
    pub prefix: String,
}

pub struct EchoBackend {
    config: EchoConfig,
}

impl EchoBackend {
    pub fn new(config: EchoConfig) -> Self {
        Self { config }
    }

    pub fn into_handle(self) -> AgentHandle {
        let (tx, mut rx) = mpsc::channel::<Request>(32);
        let config = self.config;

        tokio::spawn(async move {
            let mut conversations = 0u64;

            while let Some(request) = rx.recv().await {
                match request {
                    Request::OpenConversation { reply } => {
                        conversations += 1;
                        let _ = reply.send(Ok(ConversationId(format!("echo-{}", conversations))));
                    }
                    Request::Prompt {
                        text,
                        events,
                        accepted,
                        ..
                    } => {
                        let _ = accepted.send(Ok(()));
                        let event = match last_utterance(&text) {
                            Some(utterance) => AgentEvent::Done {
                                text: format!("{}{}", config.prefix, utterance),
                                usage: Some(Usage {
                                    input_tokens: text.split_whitespace().count() as u64,
                                    output_tokens: utterance.split_whitespace().count() as u64,
                                }),
                            },
                            None => AgentEvent::failed(FailureKind::Backend, "Nothing to echo"),
                        };
                        let _ = events.send(event).await;
                    }
                    // Answers are immediate; nothing is ever left to stop
                    Request::Cancel { reply, .. } => {
                        let _ = reply.send(0);
                    }
                }
            }
        });

        AgentHandle::new(tx, "echo")
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::BackendFactory {
        Box::new(|config| {
            let cfg: EchoConfig = if config.is_null() {
                EchoConfig::default()
            } else {
                serde_json::from_value(config.clone())?
            };
            Ok(EchoBackend::new(cfg).into_handle())
        })
    }
}

/// Text of the last `speaker: text` line that carries something after the colon
fn last_utterance(prompt: &str) -> Option<&str> {
    prompt
        .lines()
        .rev()
        .filter_map(|line| line.split_once(": ").map(|(_, rest)| rest.trim()))
        .find(|rest| !rest.is_empty())
}
