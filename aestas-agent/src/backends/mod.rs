// ABOUTME: Backend implementations (command, echo, mock) and their shared kill-switch table.
// ABOUTME: Each backend spawns a worker task and hands out an AgentHandle.

pub mod command;
pub mod echo;
pub mod mock;

use crate::handle::{CancelTarget, ConversationId, PromptId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

struct Running {
    conversation: ConversationId,
    kill: oneshot::Sender<()>,
}

/// Kill switches of the prompts a worker has in flight, keyed by prompt
#[derive(Clone, Default)]
pub(crate) struct RunningPrompts {
    inner: Arc<Mutex<HashMap<PromptId, Running>>>,
}

impl RunningPrompts {
    /// Track a new prompt; the receiver fires if it gets cancelled
    pub(crate) fn start(&self, id: PromptId, conversation: ConversationId) -> oneshot::Receiver<()> {
        let (kill, fired) = oneshot::channel();
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Running { conversation, kill });
        fired
    }

    /// Forget a prompt that ended on its own
    pub(crate) fn finish(&self, id: PromptId) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Fire and forget the kill switches matching `target`
    pub(crate) fn cancel(&self, target: &CancelTarget) -> Vec<PromptId> {
        let mut running = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let ids: Vec<PromptId> = match target {
            CancelTarget::Prompt(id) => running.contains_key(id).then_some(*id).into_iter().collect(),
            CancelTarget::Conversation(conversation) => running
                .iter()
                .filter(|(_, r)| &r.conversation == conversation)
                .map(|(id, _)| *id)
                .collect(),
        };
        let mut cancelled = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = running.remove(&id) {
                // The prompt may have just ended; its receiver is then gone
                let _ = entry.kill.send(());
                cancelled.push(id);
            }
        }
        cancelled.sort();
        cancelled
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(name: &str) -> ConversationId {
        ConversationId(name.to_string())
    }

    #[test]
    fn test_cancel_one_prompt_leaves_its_neighbour() {
        let running = RunningPrompts::default();
        let mut first = running.start(PromptId(1), conversation("c"));
        let mut second = running.start(PromptId(2), conversation("c"));

        assert_eq!(running.cancel(&CancelTarget::Prompt(PromptId(1))), vec![PromptId(1)]);
        assert!(first.try_recv().is_ok());
        assert!(second.try_recv().is_err());
        assert_eq!(running.len(), 1);

        // Finishing the cancelled prompt must not touch the other one
        running.finish(PromptId(1));
        assert_eq!(running.len(), 1);
        assert!(running.cancel(&CancelTarget::Prompt(PromptId(1))).is_empty());
    }

    #[test]
    fn test_cancel_conversation_stops_only_its_prompts() {
        let running = RunningPrompts::default();
        let _a = running.start(PromptId(1), conversation("a"));
        let _b = running.start(PromptId(2), conversation("b"));
        let _c = running.start(PromptId(3), conversation("a"));

        let cancelled = running.cancel(&CancelTarget::Conversation(conversation("a")));
        assert_eq!(cancelled, vec![PromptId(1), PromptId(3)]);
        assert_eq!(running.len(), 1);
    }
}
