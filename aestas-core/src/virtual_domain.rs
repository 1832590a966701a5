// ABOUTME: In-memory Chat Domain for tests and headless UIs
// ABOUTME: Assigns message ids, keeps live records and pending delivery callbacks

use crate::content::{ChatMember, Content, DomainId, Message, MessageId};
use crate::domain::{ChatDomain, DeliveryCallback};
use crate::error::DomainError;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

const DEFAULT_HISTORY_LIMIT: usize = 64;
const INBOUND_BUFFER: usize = 64;

/// Sink the embedding UI supplies to display or retract messages
pub trait VirtualTransport: Send + Sync {
    /// Show a message the bot sent. An error fails the send.
    fn deliver(&self, message: &Message) -> Result<(), String>;

    /// Remove a recalled message from the display
    fn retract(&self, id: MessageId) -> Result<(), String>;
}

/// When a send's delivery callback runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// As soon as the transport accepts the message
    #[default]
    Immediate,
    /// Only when `confirm` is called for the id
    Deferred,
}

#[derive(Debug, Clone)]
pub struct VirtualDomainConfig {
    pub id: DomainId,
    pub name: String,
    pub is_private: bool,
    pub self_member: ChatMember,
    pub peer: ChatMember,
    pub history_limit: usize,
    pub delivery: DeliveryMode,
}

impl VirtualDomainConfig {
    pub fn new(id: u32, name: impl Into<String>, self_member: ChatMember, peer: ChatMember) -> Self {
        Self {
            id: DomainId(id),
            name: name.into(),
            is_private: false,
            self_member,
            peer,
            history_limit: DEFAULT_HISTORY_LIMIT,
            delivery: DeliveryMode::Immediate,
        }
    }

    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn delivery(mut self, mode: DeliveryMode) -> Self {
        self.delivery = mode;
        self
    }
}

/// A live (issued, not recalled) message
struct Record {
    message: Message,
    pending: Option<DeliveryCallback>,
}

#[derive(Default)]
struct State {
    last_id: u64,
    live: HashMap<MessageId, Record>,
    history: VecDeque<Message>,
}

impl State {
    /// Ids are issued under the state lock so history stays in id order
    fn next_id(&mut self) -> MessageId {
        self.last_id += 1;
        MessageId(self.last_id)
    }

    fn record(&mut self, message: Message, pending: Option<DeliveryCallback>, history_limit: usize) {
        if history_limit > 0 {
            self.history.push_back(message.clone());
            while self.history.len() > history_limit {
                self.history.pop_front();
            }
        }
        self.live.insert(message.id, Record { message, pending });
    }
}

/// In-memory domain. Ids start at 1 and only ever grow.
pub struct VirtualDomain {
    config: VirtualDomainConfig,
    transport: Arc<dyn VirtualTransport>,
    state: Mutex<State>,
    inbound: broadcast::Sender<Message>,
}

impl VirtualDomain {
    pub fn new(config: VirtualDomainConfig, transport: Arc<dyn VirtualTransport>) -> Self {
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);
        Self {
            config,
            transport,
            state: Mutex::new(State::default()),
            inbound,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate an inbound message from the peer.
    ///
    /// The message becomes recallable and is published to `subscribe`rs.
    pub fn input(&self, contents: Vec<Content>) -> (Result<(), DomainError>, MessageId) {
        let message = {
            let mut state = self.lock();
            let message = Message::new(contents, self.config.peer.clone(), state.next_id());
            state.record(message.clone(), None, self.config.history_limit);
            message
        };
        let id = message.id;
        tracing::debug!(domain = %self.config.id, message_id = %id, "Virtual input");

        // No subscribers is fine; headless callers poll history instead
        let _ = self.inbound.send(message);
        (Ok(()), id)
    }

    /// Receive every message passed to `input` from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.inbound.subscribe()
    }

    /// Run the pending delivery callback of a deferred send
    pub fn confirm(&self, id: MessageId) -> Result<(), DomainError> {
        let (message, callback) = {
            let mut state = self.lock();
            let record = state
                .live
                .get_mut(&id)
                .ok_or(DomainError::UnknownMessage(id))?;
            let callback = record.pending.take().ok_or(DomainError::UnknownMessage(id))?;
            (record.message.clone(), callback)
        };
        callback(&message);
        Ok(())
    }

    /// Whether `id` has been issued and not recalled
    pub fn is_live(&self, id: MessageId) -> bool {
        self.lock().live.contains_key(&id)
    }

    /// Whether a deferred send for `id` still waits for confirmation
    pub fn is_pending(&self, id: MessageId) -> bool {
        self.lock()
            .live
            .get(&id)
            .is_some_and(|r| r.pending.is_some())
    }

    pub fn config(&self) -> &VirtualDomainConfig {
        &self.config
    }
}

#[async_trait]
impl ChatDomain for VirtualDomain {
    fn id(&self) -> DomainId {
        self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_private(&self) -> bool {
        self.config.is_private
    }

    fn self_member(&self) -> &ChatMember {
        &self.config.self_member
    }

    fn peer(&self) -> &ChatMember {
        &self.config.peer
    }

    async fn send(
        &self,
        on_delivered: DeliveryCallback,
        contents: Vec<Content>,
    ) -> Result<MessageId, DomainError> {
        let (message, run_now) = {
            let mut state = self.lock();
            let message = Message::new(contents, self.config.self_member.clone(), state.next_id());
            // A rejected send still consumes its id
            self.transport
                .deliver(&message)
                .map_err(DomainError::Transport)?;
            match self.config.delivery {
                DeliveryMode::Immediate => {
                    state.record(message.clone(), None, self.config.history_limit);
                    (message, Some(on_delivered))
                }
                DeliveryMode::Deferred => {
                    state.record(message.clone(), Some(on_delivered), self.config.history_limit);
                    (message, None)
                }
            }
        };

        // Callbacks run outside the lock
        if let Some(on_delivered) = run_now {
            on_delivered(&message);
        }
        Ok(message.id)
    }

    async fn recall(&self, id: MessageId) -> Result<(), DomainError> {
        let record = {
            let mut state = self.lock();
            let record = state
                .live
                .remove(&id)
                .ok_or(DomainError::UnknownMessage(id))?;
            state.history.retain(|m| m.id != id);
            record
        };
        // A pending callback is dropped uninvoked
        drop(record);

        self.transport.retract(id).map_err(DomainError::Transport)
    }

    async fn history(&self) -> Vec<Message> {
        self.lock().history.iter().cloned().collect()
    }
}
