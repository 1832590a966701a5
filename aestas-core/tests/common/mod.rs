// ABOUTME: Shared fixtures for aestas-core integration tests
// ABOUTME: Recording transport, virtual domain builders and a scripted model client

#![allow(dead_code)]

use aestas_core::{
    Bot, ChatDomain, ChatMember, Content, LanguageModelClient, Message, MessageId, ModelError,
    ModelReply, ModelRequest, VirtualDomain, VirtualDomainConfig, VirtualTransport,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BOT_ID: u32 = 1;
pub const USER_ID: u32 = 100;

/// Transport that remembers what it displayed and retracted
#[derive(Default)]
pub struct RecordingTransport {
    delivered: Mutex<Vec<Message>>,
    retracted: Mutex<Vec<MessageId>>,
}

impl RecordingTransport {
    pub fn delivered(&self) -> Vec<Message> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_texts(&self) -> Vec<String> {
        self.delivered().iter().map(|m| m.text()).collect()
    }

    pub fn retracted(&self) -> Vec<MessageId> {
        self.retracted.lock().unwrap().clone()
    }
}

impl VirtualTransport for RecordingTransport {
    fn deliver(&self, message: &Message) -> Result<(), String> {
        self.delivered.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn retract(&self, id: MessageId) -> Result<(), String> {
        self.retracted.lock().unwrap().push(id);
        Ok(())
    }
}

pub fn domain(id: u32, private: bool) -> (Arc<VirtualDomain>, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let config = VirtualDomainConfig::new(
        id,
        format!("domain-{}", id),
        ChatMember::new(BOT_ID, "aestas"),
        ChatMember::new(USER_ID, "alice"),
    )
    .private(private);
    let domain = Arc::new(VirtualDomain::new(config, transport.clone()));
    (domain, transport)
}

/// Feed a text message from the peer and return it as the domain recorded it
pub async fn say(domain: &VirtualDomain, text: &str) -> Message {
    let (result, id) = domain.input(vec![Content::text(text)]);
    result.unwrap();
    domain
        .history()
        .await
        .into_iter()
        .find(|m| m.id == id)
        .unwrap()
}

#[derive(Clone)]
pub enum Script {
    Reply(String),
    Fail(ModelError),
    Slow(Duration, String),
}

/// Model client that follows a fixed script and counts calls and deliveries
pub struct ScriptedModel {
    script: Script,
    pub calls: AtomicUsize,
    pub delivered: Arc<AtomicUsize>,
    pub instructions: Mutex<Vec<Option<String>>>,
    pub inbound: Mutex<Vec<Option<String>>>,
}

impl ScriptedModel {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            delivered: Arc::new(AtomicUsize::new(0)),
            instructions: Mutex::new(Vec::new()),
            inbound: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(Script::Reply(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn deliveries(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    fn reply(&self, text: &str) -> ModelReply {
        let delivered = Arc::clone(&self.delivered);
        ModelReply::new(
            vec![Content::text(text)],
            Box::new(move |_| {
                delivered.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }
}

#[async_trait]
impl LanguageModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn get_reply(&self, request: ModelRequest<'_>) -> Result<ModelReply, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.instructions
            .lock()
            .unwrap()
            .push(request.system_instruction.clone());
        self.inbound
            .lock()
            .unwrap()
            .push(request.inbound.map(|m| m.text()));
        match &self.script {
            Script::Reply(text) => Ok(self.reply(text)),
            Script::Fail(e) => Err(e.clone()),
            Script::Slow(delay, text) => {
                tokio::time::sleep(*delay).await;
                Ok(self.reply(text))
            }
        }
    }
}

pub fn install(bot: &Bot, model: &Arc<ScriptedModel>) {
    let model: Arc<dyn LanguageModelClient> = model.clone();
    bot.set_model(Some(model));
}
