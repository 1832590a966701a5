// ABOUTME: AgentHandle - cloneable front for a backend worker task, driven by Request messages.
// ABOUTME: Every prompt gets its own PromptId so overlapping prompts in one conversation stay apart.

use crate::AgentEvent;
use anyhow::{anyhow, Result};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Capacity of each prompt's event stream
const STREAM_BUFFER: usize = 256;

/// Backend-assigned id grouping the prompts of one chat conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one submitted prompt. Unique per backend worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromptId(pub u64);

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prompt-{}", self.0)
    }
}

/// Which running prompts a cancel applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelTarget {
    Prompt(PromptId),
    Conversation(ConversationId),
}

/// Messages from an AgentHandle to its backend worker
#[derive(Debug)]
pub enum Request {
    OpenConversation {
        reply: oneshot::Sender<Result<ConversationId>>,
    },
    Prompt {
        id: PromptId,
        conversation: ConversationId,
        text: String,
        events: mpsc::Sender<AgentEvent>,
        accepted: oneshot::Sender<Result<()>>,
    },
    /// Replies with the number of prompts that were stopped
    Cancel {
        target: CancelTarget,
        reply: oneshot::Sender<usize>,
    },
}

fn worker_gone<T>(_: T) -> anyhow::Error {
    anyhow!("Backend worker closed")
}

/// Send + Sync handle the runtime holds for a model backend
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<Request>,
    name: &'static str,
    next_prompt: Arc<AtomicU64>,
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl AgentHandle {
    /// Wrap the request channel of a freshly spawned worker
    pub fn new(tx: mpsc::Sender<Request>, name: &'static str) -> Self {
        Self {
            tx,
            name,
            next_prompt: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn open_conversation(&self) -> Result<ConversationId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::OpenConversation { reply })
            .await
            .map_err(worker_gone)?;
        rx.await.map_err(worker_gone)?
    }

    /// Submit `text` and stream the backend's answer.
    ///
    /// Returns once the worker has accepted the prompt.
    pub async fn prompt(&self, conversation: &ConversationId, text: &str) -> Result<PromptStream> {
        let id = PromptId(self.next_prompt.fetch_add(1, Ordering::Relaxed));
        let (events, rx) = mpsc::channel(STREAM_BUFFER);
        let (accepted, accepted_rx) = oneshot::channel();

        self.tx
            .send(Request::Prompt {
                id,
                conversation: conversation.clone(),
                text: text.to_string(),
                events,
                accepted,
            })
            .await
            .map_err(worker_gone)?;
        accepted_rx.await.map_err(worker_gone)??;

        Ok(PromptStream { id, rx })
    }

    /// Stop one prompt. `false` when it had already finished.
    pub async fn cancel(&self, prompt: PromptId) -> Result<bool> {
        Ok(self.cancel_target(CancelTarget::Prompt(prompt)).await? > 0)
    }

    /// Stop every prompt still running in `conversation`
    pub async fn cancel_conversation(&self, conversation: &ConversationId) -> Result<usize> {
        self.cancel_target(CancelTarget::Conversation(conversation.clone()))
            .await
    }

    async fn cancel_target(&self, target: CancelTarget) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Cancel { target, reply })
            .await
            .map_err(worker_gone)?;
        rx.await.map_err(worker_gone)
    }
}

/// The events of one prompt. `Send`, so it may move between tasks.
pub struct PromptStream {
    id: PromptId,
    rx: mpsc::Receiver<AgentEvent>,
}

impl PromptStream {
    pub fn new(id: PromptId, rx: mpsc::Receiver<AgentEvent>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> PromptId {
        self.id
    }

    /// Next event, or `None` once the backend dropped the stream
    pub async fn recv(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<AgentEvent> {
        self.rx.try_recv().ok()
    }
}
