// ABOUTME: LanguageModelClient backed by an aestas-agent AgentHandle
// ABOUTME: One backend conversation per domain, prompt built from instruction + history

use crate::content::{Content, DomainId, Message, MessageId};
use crate::error::ModelError;
use crate::model::{LanguageModelClient, ModelReply, ModelRequest};
use aestas_agent::{AgentEvent, AgentHandle, ConversationId, FailureKind, PromptId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Bridges a model backend into the runtime's model contract
pub struct AgentModelClient {
    handle: AgentHandle,
    conversations: tokio::sync::Mutex<HashMap<DomainId, ConversationId>>,
    last_replies: Arc<Mutex<HashMap<DomainId, MessageId>>>,
}

impl AgentModelClient {
    pub fn new(handle: AgentHandle) -> Self {
        Self {
            handle,
            conversations: tokio::sync::Mutex::new(HashMap::new()),
            last_replies: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Id of the most recent reply of ours that was delivered in `domain`
    pub fn last_reply(&self, domain: DomainId) -> Option<MessageId> {
        self.last_replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&domain)
            .copied()
    }

    /// Render the prompt text sent to the backend.
    ///
    /// `inbound` replaces the history entry with its id, or is appended when
    /// the history does not hold it.
    pub fn build_prompt(
        bot_name: &str,
        instruction: Option<&str>,
        history: &[Message],
        inbound: Option<&Message>,
    ) -> String {
        let mut prompt = String::new();
        if let Some(instruction) = instruction.filter(|s| !s.trim().is_empty()) {
            prompt.push_str(instruction.trim_end());
            prompt.push_str("\n\n");
        }

        let mut push = |message: &Message| {
            prompt.push_str(&message.sender.name);
            prompt.push_str(": ");
            prompt.push_str(&message.text());
            prompt.push('\n');
        };
        let mut inbound_seen = false;
        for message in history {
            match inbound {
                Some(inbound) if inbound.id == message.id => {
                    inbound_seen = true;
                    push(inbound);
                }
                _ => push(message),
            }
        }
        if let Some(inbound) = inbound.filter(|_| !inbound_seen) {
            push(inbound);
        }

        prompt.push_str(bot_name);
        prompt.push(':');
        prompt
    }

    async fn conversation_for(&self, domain: DomainId) -> Result<ConversationId, ModelError> {
        let mut conversations = self.conversations.lock().await;
        if let Some(id) = conversations.get(&domain) {
            return Ok(id.clone());
        }
        let id = self
            .handle
            .open_conversation()
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;
        tracing::debug!(backend = %self.handle.name(), domain = %domain, conversation = %id, "Opened backend conversation");
        conversations.insert(domain, id.clone());
        Ok(id)
    }
}

/// Cancels the backend prompt if the reply future is dropped mid-stream
struct CancelOnDrop {
    handle: AgentHandle,
    prompt: PromptId,
    armed: bool,
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let handle = self.handle.clone();
        let prompt = self.prompt;
        tracing::debug!(%prompt, "Reply abandoned, cancelling backend prompt");
        runtime.spawn(async move {
            if let Err(e) = handle.cancel(prompt).await {
                tracing::debug!(%prompt, error = %e, "Failed to cancel abandoned prompt");
            }
        });
    }
}

#[async_trait]
impl LanguageModelClient for AgentModelClient {
    fn name(&self) -> &str {
        self.handle.name()
    }

    async fn get_reply(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        let domain_id = request.domain.id();
        let history = request.domain.history().await;
        let prompt = Self::build_prompt(
            request.bot.name(),
            request.system_instruction.as_deref(),
            &history,
            request.inbound,
        );

        let conversation = self.conversation_for(domain_id).await?;
        let mut stream = self
            .handle
            .prompt(&conversation, &prompt)
            .await
            .map_err(|e| ModelError::Unavailable(e.to_string()))?;

        let mut guard = CancelOnDrop {
            handle: self.handle.clone(),
            prompt: stream.id(),
            armed: true,
        };
        let mut text = String::new();
        let outcome = loop {
            match stream.recv().await {
                Some(AgentEvent::Chunk(chunk)) => text.push_str(&chunk),
                Some(AgentEvent::Done { text: full, usage }) => {
                    if text.is_empty() {
                        text = full;
                    }
                    if let Some(usage) = usage {
                        tracing::debug!(
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "Backend usage"
                        );
                    }
                    break Ok(());
                }
                Some(AgentEvent::Failed(failure)) if failure.kind == FailureKind::Cancelled => {
                    break Err(ModelError::Cancelled);
                }
                Some(AgentEvent::Failed(failure)) => {
                    break Err(ModelError::Generation(failure.to_string()));
                }
                None => {
                    break Err(ModelError::Generation(
                        "backend closed the stream without a result".to_string(),
                    ));
                }
            }
        };
        guard.armed = false;
        outcome?;

        let text = text.trim();
        if text.is_empty() {
            return Err(ModelError::EmptyReply);
        }

        let last_replies = Arc::clone(&self.last_replies);
        Ok(ModelReply::new(
            vec![Content::text(text)],
            Box::new(move |message: &Message| {
                last_replies
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(domain_id, message.id);
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ChatMember;

    fn message(id: u64, who: &str, text: &str) -> Message {
        Message::new(vec![Content::text(text)], ChatMember::new(0, who), MessageId(id))
    }

    #[test]
    fn test_build_prompt_with_instruction_and_history() {
        let history = vec![message(1, "alice", "hi"), message(2, "aestas", "hello alice")];
        let prompt = AgentModelClient::build_prompt("aestas", Some("Be brief.\n"), &history, None);
        assert_eq!(prompt, "Be brief.\n\nalice: hi\naestas: hello alice\naestas:");
    }

    #[test]
    fn test_build_prompt_without_instruction() {
        let prompt = AgentModelClient::build_prompt("bot", None, &[], None);
        assert_eq!(prompt, "bot:");

        let prompt = AgentModelClient::build_prompt("bot", Some("   "), &[], None);
        assert_eq!(prompt, "bot:");
    }

    #[test]
    fn test_inbound_replaces_recorded_copy() {
        let history = vec![message(1, "alice", "//Info please"), message(2, "alice", "thanks")];
        let inbound = message(1, "alice", "/Info please");
        let prompt = AgentModelClient::build_prompt("aestas", None, &history, Some(&inbound));
        assert_eq!(prompt, "alice: /Info please\nalice: thanks\naestas:");
    }

    #[test]
    fn test_inbound_missing_from_history_is_appended() {
        let history = vec![message(1, "alice", "earlier")];
        let inbound = message(9, "alice", "now");
        let prompt = AgentModelClient::build_prompt("aestas", None, &history, Some(&inbound));
        assert_eq!(prompt, "alice: earlier\nalice: now\naestas:");
    }
}
