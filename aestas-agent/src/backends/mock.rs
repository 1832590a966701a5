// ABOUTME: Scripted backend for tests: canned answers picked by substring, optional delays.
// ABOUTME: Logs every prompt and every cancel so tests can see what the runtime asked for.

use super::RunningPrompts;
use crate::event::{AgentEvent, FailureKind};
use crate::handle::{AgentHandle, ConversationId, PromptId, Request};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// A canned answer, used once
struct Script {
    pattern: String,
    delay: Option<Duration>,
    events: Vec<AgentEvent>,
}

/// Scripted backend. Unmatched prompts get a `Done` naming the prompt.
#[derive(Default)]
pub struct MockBackend {
    scripts: VecDeque<Script>,
    prompts: Arc<Mutex<Vec<String>>>,
    cancelled: Arc<Mutex<Vec<PromptId>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the answer for the next prompt containing `pattern`
    pub fn on_prompt(self, pattern: &str) -> ScriptBuilder {
        ScriptBuilder {
            backend: self,
            pattern: pattern.to_string(),
            delay: None,
        }
    }

    /// Every prompt text received, in arrival order
    pub fn prompt_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.prompts)
    }

    /// Prompts that were stopped by a cancel while still running
    pub fn cancel_log(&self) -> Arc<Mutex<Vec<PromptId>>> {
        Arc::clone(&self.cancelled)
    }

    pub fn into_handle(self) -> AgentHandle {
        let (tx, mut rx) = mpsc::channel::<Request>(32);
        let MockBackend {
            mut scripts,
            prompts,
            cancelled,
        } = self;
        let running = RunningPrompts::default();

        tokio::spawn(async move {
            let mut conversations = 0u64;

            while let Some(request) = rx.recv().await {
                match request {
                    Request::OpenConversation { reply } => {
                        conversations += 1;
                        let _ = reply.send(Ok(ConversationId(format!("mock-{}", conversations))));
                    }
                    Request::Prompt {
                        id,
                        conversation,
                        text,
                        events,
                        accepted,
                    } => {
                        let kill = running.start(id, conversation);
                        let _ = accepted.send(Ok(()));
                        prompts
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .push(text.clone());

                        let script = scripts
                            .iter()
                            .position(|s| text.contains(&s.pattern))
                            .and_then(|i| scripts.remove(i))
                            .unwrap_or_else(|| Script {
                                pattern: String::new(),
                                delay: None,
                                events: vec![AgentEvent::done(format!("Mock: no script for '{}'", text))],
                            });

                        // Answered off the worker loop so cancels are served meanwhile
                        let running = running.clone();
                        tokio::spawn(async move {
                            let delay = script.delay.unwrap_or_default();
                            tokio::select! {
                                _ = tokio::time::sleep(delay) => {
                                    for event in script.events {
                                        if events.send(event).await.is_err() {
                                            break;
                                        }
                                    }
                                }
                                Ok(()) = kill => {
                                    let _ = events.send(AgentEvent::failed(FailureKind::Cancelled, "")).await;
                                }
                            }
                            running.finish(id);
                        });
                    }
                    Request::Cancel { target, reply } => {
                        let stopped = running.cancel(&target);
                        let count = stopped.len();
                        cancelled
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .extend(stopped);
                        let _ = reply.send(count);
                    }
                }
            }
        });

        AgentHandle::new(tx, "mock")
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::BackendFactory {
        Box::new(|_config| Ok(MockBackend::new().into_handle()))
    }
}

/// Finishes an `on_prompt` call
pub struct ScriptBuilder {
    backend: MockBackend,
    pattern: String,
    delay: Option<Duration>,
}

impl ScriptBuilder {
    /// Hold the answer back for `delay`
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond_with(mut self, events: Vec<AgentEvent>) -> MockBackend {
        self.backend.scripts.push_back(Script {
            pattern: self.pattern,
            delay: self.delay,
            events,
        });
        self.backend
    }

    pub fn respond_text(self, text: &str) -> MockBackend {
        self.respond_with(vec![AgentEvent::done(text)])
    }

    pub fn respond_error(self, kind: FailureKind, message: &str) -> MockBackend {
        self.respond_with(vec![AgentEvent::failed(kind, message)])
    }
}
