// ABOUTME: End-to-end tests for the console adapter over the echo backend
// ABOUTME: Feeds scripted stdin lines through the runtime and checks the printed transcript

use aestas::app::Runtime;
use aestas::config::Config;
use aestas::platform::{AdapterRegistry, ConsoleAdapter, ConsoleOutput};
use aestas_agent::AgentRegistry;
use aestas_core::{ChatDomain, DomainId, ProtocolAdapter};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

struct Transcript(Arc<Mutex<Vec<u8>>>);

impl Transcript {
    fn new() -> (Self, ConsoleOutput) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let output: ConsoleOutput = buf.clone();
        (Self(buf), output)
    }

    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

async fn run_script(config: Config, script: &str) -> (Runtime, Transcript) {
    let (transcript, output) = Transcript::new();
    let input = Cursor::new(script.as_bytes().to_vec());
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(ConsoleAdapter::new(config.console.clone(), input, output)));

    let runtime = Runtime::start(&config, &AgentRegistry::default(), adapters)
        .await
        .unwrap();
    runtime.run(CancellationToken::new()).await.unwrap();
    (runtime, transcript)
}

#[tokio::test]
async fn test_chat_line_gets_echo_reply() {
    let (runtime, transcript) = run_script(Config::default(), "hello\n:quit\nignored\n").await;

    assert_eq!(transcript.lines(), vec!["[#1] you: hello", "[#2] aestas: hello"]);
    assert_eq!(runtime.bot.domain_ids(), vec![DomainId(1)]);
}

#[tokio::test]
async fn test_info_command_prints_system_lines() {
    let (_runtime, transcript) = run_script(Config::default(), "/Info\n").await;

    let text = transcript.text();
    assert!(text.starts_with("[#1] you: /Info\n[#2] aestas: OS: "));
    assert!(text.contains("Arch: "));
    assert!(text.contains("Version: aestas "));
}

#[tokio::test]
async fn test_unknown_command_reports_error() {
    let (_runtime, transcript) = run_script(Config::default(), "/Dance\n").await;

    assert_eq!(
        transcript.lines(),
        vec![
            "[#1] you: /Dance",
            "[#2] aestas: Unknown command: Dance",
            "[error: Unknown command: Dance]",
        ]
    );
}

#[tokio::test]
async fn test_say_and_recall() {
    let (_runtime, transcript) =
        run_script(Config::default(), ":say good night\n:recall 1\n:recall 1\n:recall\n").await;

    assert_eq!(
        transcript.lines(),
        vec![
            "[#1] aestas: good night",
            "[#1 recalled]",
            "[error: unknown message: #1]",
            "[usage: :recall <message id>]",
        ]
    );
}

#[tokio::test]
async fn test_configured_prefix_and_names() {
    let mut config = Config::default();
    config.bot.name = "summer".to_string();
    config.bot.command_prefix = "!".to_string();
    config.console.user_name = "alice".to_string();

    let (_runtime, transcript) = run_script(config, "/Info is just text\n!Help Info\n").await;

    assert_eq!(
        transcript.lines(),
        vec![
            "[#1] alice: /Info is just text",
            "[#2] summer: /Info is just text",
            "[#3] alice: !Help Info",
            "[#4] summer: Info - Show information about the host system",
        ]
    );
}

#[tokio::test]
async fn test_user_can_recall_own_line_by_printed_id() {
    let (runtime, transcript) = run_script(Config::default(), "oops\n:recall 1\n").await;

    assert_eq!(
        transcript.lines(),
        vec!["[#1] you: oops", "[#2] aestas: oops", "[#1 recalled]"]
    );
    let domain = runtime.bot.domain(DomainId(1)).unwrap();
    let ids: Vec<u64> = domain.history().await.iter().map(|m| m.id.0).collect();
    assert_eq!(ids, vec![2]);
}

#[tokio::test]
async fn test_run_twice_fails() {
    let config = Config::default();
    let (_transcript, output) = Transcript::new();
    let adapter = Arc::new(ConsoleAdapter::new(
        config.console.clone(),
        Cursor::new(Vec::new()),
        output,
    ));
    let mut adapters = AdapterRegistry::new();
    adapters.register(adapter.clone());
    let runtime = Runtime::start(&config, &AgentRegistry::default(), adapters)
        .await
        .unwrap();

    runtime.run(CancellationToken::new()).await.unwrap();
    let err = adapter
        .run(runtime.orchestrator.clone(), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already consumed"));
}

#[tokio::test]
async fn test_shutdown_stops_waiting_console() {
    let config = Config::default();
    let (_transcript, output) = Transcript::new();
    // Keep the writer half alive so reads block
    let (_writer, reader) = tokio::io::duplex(64);
    let mut adapters = AdapterRegistry::new();
    adapters.register(Arc::new(ConsoleAdapter::new(
        config.console.clone(),
        BufReader::new(reader),
        output,
    )));
    let runtime = Runtime::start(&config, &AgentRegistry::default(), adapters)
        .await
        .unwrap();

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), runtime.run(shutdown))
        .await
        .expect("console did not stop on shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_unknown_domain_view_rejected() {
    let config = Config::default();
    let (_transcript, output) = Transcript::new();
    let adapter = ConsoleAdapter::new(config.console.clone(), Cursor::new(Vec::new()), output);
    let bot = aestas_core::Bot::new("aestas");

    assert_eq!(adapter.fetch_domains().await.len(), 1);
    assert!(adapter.init_domain_view(&bot, DomainId(99)).await.is_err());
    let view = adapter.init_domain_view(&bot, DomainId(1)).await.unwrap();
    assert!(view.is_private());
    assert_eq!(view.self_member().name, "aestas");
}
