// ABOUTME: Integration tests for AgentModelClient over the mock backend
// ABOUTME: Checks prompt shape, error mapping, abandoned prompts and overlapping replies

mod common;

use aestas_agent::backends::mock::MockBackend;
use aestas_agent::{AgentEvent, FailureKind};
use aestas_core::{
    AgentModelClient, Bot, BotError, InstructionPipeline, LanguageModelClient, MessageId,
    ModelError,
};
use common::{domain, say};
use std::sync::Arc;
use std::time::Duration;

fn bot_with(client: &Arc<AgentModelClient>) -> Bot {
    let bot = Bot::new("aestas");
    let model: Arc<dyn LanguageModelClient> = client.clone();
    bot.set_model(Some(model));
    bot
}

#[tokio::test]
async fn test_prompt_contains_instruction_and_history() {
    let mock = MockBackend::new().on_prompt("alice: hello").respond_text("hi alice");
    let log = mock.prompt_log();
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    bot.set_system_instruction_builder(Some(InstructionPipeline::new().line("Be brief.")));
    let (domain, transport) = domain(1, true);
    let inbound = say(&domain, "hello").await;

    let id = bot.respond(&*domain, &inbound).await.unwrap();

    assert_eq!(transport.delivered_texts(), vec!["hi alice"]);
    assert_eq!(
        log.lock().unwrap().clone(),
        vec!["Be brief.\n\nalice: hello\naestas:".to_string()]
    );
    assert_eq!(client.last_reply(domain.config().id), Some(id));
}

#[tokio::test]
async fn test_streamed_chunks_are_joined() {
    let mock = MockBackend::new().on_prompt("weather").respond_with(vec![
        AgentEvent::Chunk("Sunny, ".to_string()),
        AgentEvent::Chunk("22 degrees".to_string()),
        AgentEvent::done("ignored"),
    ]);
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    let (domain, transport) = domain(1, true);
    let inbound = say(&domain, "weather?").await;

    bot.respond(&*domain, &inbound).await.unwrap();

    assert_eq!(transport.delivered_texts(), vec!["Sunny, 22 degrees"]);
}

#[tokio::test]
async fn test_backend_error_maps_to_generation() {
    let mock = MockBackend::new()
        .on_prompt("hello")
        .respond_error(FailureKind::RateLimited, "slow down");
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    let (domain, transport) = domain(1, true);
    let inbound = say(&domain, "hello").await;

    let err = bot.respond(&*domain, &inbound).await.unwrap_err();

    match err {
        BotError::Model(ModelError::Generation(message)) => {
            assert_eq!(message, "rate limited: slow down");
        }
        other => panic!("Expected generation failure, got {:?}", other),
    }
    assert!(transport.delivered().is_empty());
    assert_eq!(client.last_reply(domain.config().id), None);
}

#[tokio::test]
async fn test_blank_result_is_empty_reply() {
    let mock = MockBackend::new().on_prompt("hello").respond_text("   ");
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    let (domain, _transport) = domain(1, true);
    let inbound = say(&domain, "hello").await;

    let err = bot.reply(&*domain, &inbound).await.unwrap_err();
    assert_eq!(err, BotError::Model(ModelError::EmptyReply));
}

#[tokio::test]
async fn test_last_reply_tracked_per_domain() {
    let mock = MockBackend::new();
    let log = mock.prompt_log();
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    let (first, _) = domain(1, true);
    let (second, _) = domain(2, false);

    for domain in [first.clone(), second.clone(), first.clone()] {
        let inbound = say(&domain, "ping").await;
        bot.respond(&*domain, &inbound).await.unwrap();
    }

    assert_eq!(log.lock().unwrap().len(), 3);
    // First domain: ping(1), reply(2), ping(3), reply(4)
    assert_eq!(client.last_reply(first.config().id), Some(MessageId(4)));
    assert_eq!(client.last_reply(second.config().id), Some(MessageId(2)));
}

#[tokio::test]
async fn test_client_reports_backend_name() {
    let client = AgentModelClient::new(MockBackend::new().into_handle());
    assert_eq!(client.name(), "mock");
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_reply_cancels_backend_prompt() {
    let mock = MockBackend::new()
        .on_prompt("hello")
        .delay(Duration::from_secs(30))
        .respond_text("too late");
    let cancels = mock.cancel_log();
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    bot.set_reply_timeout(Duration::from_secs(1));
    let (domain, transport) = domain(1, true);
    let inbound = say(&domain, "hello").await;

    let err = bot.respond(&*domain, &inbound).await.unwrap_err();
    assert_eq!(err, BotError::Model(ModelError::Timeout(Duration::from_secs(1))));

    // The cancel is sent from a spawned task once the reply future is dropped
    for _ in 0..10 {
        if !cancels.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cancels.lock().unwrap().len(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(transport.delivered().is_empty());
    assert_eq!(client.last_reply(domain.config().id), None);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_replies_in_one_domain() {
    let mock = MockBackend::new()
        .on_prompt("alice: hello")
        .delay(Duration::from_secs(2))
        .respond_text("slow")
        .on_prompt("alice: hello")
        .respond_text("fast");
    let log = mock.prompt_log();
    let cancels = mock.cancel_log();
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    let (domain, _transport) = domain(1, true);
    let inbound = say(&domain, "hello").await;

    let (first, second) = tokio::join!(
        bot.reply(&*domain, &inbound),
        bot.reply(&*domain, &inbound)
    );

    let mut texts = vec![
        first.unwrap().contents[0].to_string(),
        second.unwrap().contents[0].to_string(),
    ];
    texts.sort();
    assert_eq!(texts, vec!["fast", "slow"]);
    assert_eq!(log.lock().unwrap().len(), 2);
    assert!(cancels.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_reply_spares_its_overlapping_neighbour() {
    let mock = MockBackend::new()
        .on_prompt("alice: hello")
        .delay(Duration::from_secs(30))
        .respond_text("stuck")
        .on_prompt("alice: hello")
        .delay(Duration::from_millis(500))
        .respond_text("quick");
    let cancels = mock.cancel_log();
    let client = Arc::new(AgentModelClient::new(mock.into_handle()));
    let bot = bot_with(&client);
    bot.set_reply_timeout(Duration::from_secs(1));
    let (domain, _transport) = domain(1, true);
    let inbound = say(&domain, "hello").await;

    let (first, second) = tokio::join!(
        bot.reply(&*domain, &inbound),
        bot.reply(&*domain, &inbound)
    );

    assert_eq!(
        first.unwrap_err(),
        BotError::Model(ModelError::Timeout(Duration::from_secs(1)))
    );
    assert_eq!(second.unwrap().contents[0].to_string(), "quick");
    for _ in 0..10 {
        if !cancels.lock().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cancels.lock().unwrap().len(), 1);
}
