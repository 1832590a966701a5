// ABOUTME: Bot - owns its model, prefix builder, instruction pipeline and domains
// ABOUTME: Implements the Reply / SelfTalk / Recall orchestration over any ChatDomain

use crate::content::{Content, DomainId, Message, MessageId};
use crate::domain::{noop_callback, ChatDomain, DeliveryCallback};
use crate::error::{BotError, ModelError};
use crate::instruction::InstructionPipeline;
use crate::metrics;
use crate::model::{LanguageModelClient, ModelRequest};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Default upper bound on a single model call
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Shapes an outgoing envelope before it is handed to the domain
pub type PrefixBuilder = Arc<dyn Fn(&Bot, Message) -> Message + Send + Sync>;

/// Model output ready for `ChatDomain::send`
pub struct Reply {
    pub contents: Vec<Content>,
    pub on_delivered: DeliveryCallback,
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("contents", &self.contents)
            .finish_non_exhaustive()
    }
}

/// A chat bot.
///
/// Strategy fields are swapped copy-on-write: readers clone the `Arc` out of
/// the lock and never hold a guard across an await, so reconfiguring a bot
/// while replies are in flight is safe.
pub struct Bot {
    name: String,
    model: RwLock<Option<Arc<dyn LanguageModelClient>>>,
    prefix_builder: RwLock<Option<PrefixBuilder>>,
    system_instruction_builder: RwLock<Option<Arc<InstructionPipeline>>>,
    reply_timeout: RwLock<Duration>,
    domains: RwLock<HashMap<DomainId, Arc<dyn ChatDomain>>>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

impl Bot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: RwLock::new(None),
            prefix_builder: RwLock::new(None),
            system_instruction_builder: RwLock::new(None),
            reply_timeout: RwLock::new(DEFAULT_REPLY_TIMEOUT),
            domains: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    pub fn model(&self) -> Option<Arc<dyn LanguageModelClient>> {
        read(&self.model).clone()
    }

    pub fn set_model(&self, model: Option<Arc<dyn LanguageModelClient>>) {
        *write(&self.model) = model;
    }

    pub fn prefix_builder(&self) -> Option<PrefixBuilder> {
        read(&self.prefix_builder).clone()
    }

    pub fn set_prefix_builder(&self, builder: Option<PrefixBuilder>) {
        *write(&self.prefix_builder) = builder;
    }

    pub fn system_instruction_builder(&self) -> Option<Arc<InstructionPipeline>> {
        read(&self.system_instruction_builder).clone()
    }

    pub fn set_system_instruction_builder(&self, pipeline: Option<InstructionPipeline>) {
        *write(&self.system_instruction_builder) = pipeline.map(Arc::new);
    }

    pub fn reply_timeout(&self) -> Duration {
        *read(&self.reply_timeout)
    }

    pub fn set_reply_timeout(&self, timeout: Duration) {
        *write(&self.reply_timeout) = timeout;
    }

    /// Build the system instruction, or `None` when no pipeline is set
    pub fn system_instruction(&self) -> Result<Option<String>, BotError> {
        match self.system_instruction_builder() {
            Some(pipeline) => pipeline.run(self).map(Some),
            None => Ok(None),
        }
    }

    // -------------------------------------------------------------------------
    // Domain registry
    // -------------------------------------------------------------------------

    /// Register a domain under its id, returning any domain it replaced
    pub fn attach_domain(&self, domain: Arc<dyn ChatDomain>) -> Option<Arc<dyn ChatDomain>> {
        let id = domain.id();
        tracing::debug!(bot = %self.name, domain = %id, name = %domain.name(), "Attaching domain");
        write(&self.domains).insert(id, domain)
    }

    pub fn detach_domain(&self, id: DomainId) -> Option<Arc<dyn ChatDomain>> {
        write(&self.domains).remove(&id)
    }

    pub fn domain(&self, id: DomainId) -> Option<Arc<dyn ChatDomain>> {
        read(&self.domains).get(&id).cloned()
    }

    /// Ids of all attached domains, sorted
    pub fn domain_ids(&self) -> Vec<DomainId> {
        let mut ids: Vec<DomainId> = read(&self.domains).keys().copied().collect();
        ids.sort();
        ids
    }

    // -------------------------------------------------------------------------
    // Orchestration
    // -------------------------------------------------------------------------

    /// Ask the model for a reply to `inbound`.
    ///
    /// Nothing is sent: the caller passes the result to `ChatDomain::send`.
    /// Without a model this fails immediately with `ConfigurationMissing`; a
    /// failing instruction stage stops it before the model is asked.
    pub async fn reply(&self, domain: &dyn ChatDomain, inbound: &Message) -> Result<Reply, BotError> {
        self.reply_with_cancel(domain, inbound, &CancellationToken::new())
            .await
    }

    /// `reply`, additionally aborted when `cancel` fires
    pub async fn reply_with_cancel(
        &self,
        domain: &dyn ChatDomain,
        inbound: &Message,
        cancel: &CancellationToken,
    ) -> Result<Reply, BotError> {
        tracing::debug!(
            bot = %self.name,
            domain = %domain.id(),
            inbound = %inbound.id,
            sender = %inbound.sender.name,
            "Generating reply"
        );
        self.generate(domain, Some(inbound), cancel).await
    }

    /// Bot-initiated message.
    ///
    /// With `None` the model produces the content (failing like `reply`);
    /// otherwise `contents` is sent as given, after the prefix builder.
    pub async fn self_talk(
        &self,
        domain: &dyn ChatDomain,
        contents: Option<Vec<Content>>,
    ) -> Result<MessageId, BotError> {
        let reply = match contents {
            Some(contents) => Reply {
                contents: self.shape_outgoing(domain, contents),
                on_delivered: noop_callback(),
            },
            None => self.generate(domain, None, &CancellationToken::new()).await?,
        };
        self.deliver(domain, reply).await
    }

    /// Reply to `inbound` and send the result into the same domain
    pub async fn respond(&self, domain: &dyn ChatDomain, inbound: &Message) -> Result<MessageId, BotError> {
        let reply = self.reply(domain, inbound).await?;
        self.deliver(domain, reply).await
    }

    /// Retract a message previously delivered in `domain`
    pub async fn recall(&self, domain: &dyn ChatDomain, id: MessageId) -> Result<(), BotError> {
        let result = domain.recall(id).await;
        metrics::record_recall(result.is_ok());
        if let Err(e) = &result {
            tracing::warn!(bot = %self.name, domain = %domain.id(), message_id = %id, error = %e, "Recall failed");
        }
        result.map_err(BotError::from)
    }

    async fn deliver(&self, domain: &dyn ChatDomain, reply: Reply) -> Result<MessageId, BotError> {
        let result = domain.send(reply.on_delivered, reply.contents).await;
        metrics::record_send(result.is_ok());
        match &result {
            Ok(id) => tracing::debug!(bot = %self.name, domain = %domain.id(), message_id = %id, "Message sent"),
            Err(e) => tracing::warn!(bot = %self.name, domain = %domain.id(), error = %e, "Send failed"),
        }
        result.map_err(BotError::from)
    }

    async fn generate(
        &self,
        domain: &dyn ChatDomain,
        inbound: Option<&Message>,
        cancel: &CancellationToken,
    ) -> Result<Reply, BotError> {
        let model = self.model().ok_or(BotError::ConfigurationMissing("model"))?;
        let instruction = self.system_instruction().map_err(|e| {
            tracing::warn!(bot = %self.name, domain = %domain.id(), error = %e, "System instruction failed");
            e
        })?;
        let request = ModelRequest::new(self, domain)
            .with_system_instruction(instruction)
            .with_inbound(inbound);
        let timeout = self.reply_timeout();
        let start = Instant::now();

        let result = tokio::select! {
            result = tokio::time::timeout(timeout, model.get_reply(request)) => {
                result.unwrap_or(Err(ModelError::Timeout(timeout)))
            }
            _ = cancel.cancelled() => Err(ModelError::Cancelled),
        };

        metrics::record_reply(result.is_ok(), start.elapsed().as_secs_f64());
        let reply = result.map_err(|e| {
            tracing::warn!(bot = %self.name, model = %model.name(), domain = %domain.id(), error = %e, "Model failed");
            BotError::Model(e)
        })?;

        Ok(Reply {
            contents: self.shape_outgoing(domain, reply.contents),
            on_delivered: reply.on_delivered,
        })
    }

    /// Run the prefix builder over a draft envelope from the bot's member
    fn shape_outgoing(&self, domain: &dyn ChatDomain, contents: Vec<Content>) -> Vec<Content> {
        match self.prefix_builder() {
            Some(builder) => {
                let draft = Message::new(contents, domain.self_member().clone(), MessageId::PENDING);
                builder(self, draft).contents
            }
            None => contents,
        }
    }
}

impl std::fmt::Debug for Bot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bot")
            .field("name", &self.name)
            .field("has_model", &read(&self.model).is_some())
            .field("domains", &self.domain_ids())
            .finish()
    }
}
