// ABOUTME: Main entry point for the aestas chat bot runtime
// ABOUTME: Initializes logging, config and metrics, then runs, lists domains or lists commands

use aestas::app::{self, Runtime};
use aestas::config::{Config, DEFAULT_CONFIG_PATH};
use aestas::platform::{AdapterRegistry, ConsoleAdapter};
use aestas_agent::AgentRegistry;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "aestas")]
#[command(about = "Aestas - chat bot runtime with model replies, recall and commands", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the bot on the console (default)
    Run,
    /// List the domains each adapter exposes
    Domains,
    /// List the registered chat commands
    Commands,
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    // stdout belongs to the console adapter
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn adapters(config: &Config) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register(Arc::new(ConsoleAdapter::stdio(config.console.clone())));
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    dotenvy::dotenv().ok();
    let config = Config::load(&cli.config)?;
    tracing::debug!(
        path = %cli.config.display(),
        bot = %config.bot.name,
        backend = %config.backend.backend_type(),
        prefix = %config.bot.command_prefix,
        "Configuration loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            app::install_metrics(&config.metrics)?;
            let agents = AgentRegistry::default();
            let runtime = Runtime::start(&config, &agents, adapters(&config)).await?;

            let shutdown = CancellationToken::new();
            let ctrl_c = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, shutting down");
                    ctrl_c.cancel();
                }
            });

            runtime.run(shutdown).await?;
        }
        Commands::Domains => {
            for (adapter, domain) in adapters(&config).domains().await {
                let kind = if domain.is_private { "private" } else { "group" };
                println!("{}\t{}\t{}\t{}", adapter, domain.id, domain.name, kind);
            }
        }
        Commands::Commands => {
            for summary in app::build_commands().summaries() {
                println!(
                    "{}{}\t{:?}\t{:?}\t{}",
                    config.bot.command_prefix,
                    summary.name,
                    summary.accessible_domain,
                    summary.privilege,
                    summary.help
                );
            }
        }
    }

    Ok(())
}
