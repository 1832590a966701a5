// ABOUTME: Command backend - spawns an external program per prompt.
// ABOUTME: Feeds the prompt on stdin while streaming stdout lines; exit status decides success.

use super::RunningPrompts;
use crate::event::{AgentEvent, FailureKind};
use crate::handle::{AgentHandle, ConversationId, Request};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command as ProcessCommand};
use tokio::sync::{mpsc, oneshot};

/// Configuration for the command backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to run for each prompt
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

pub struct CommandBackend {
    config: CommandConfig,
}

impl CommandBackend {
    pub fn new(config: CommandConfig) -> Result<Self> {
        if config.program.trim().is_empty() {
            anyhow::bail!("command backend requires a non-empty `program`");
        }
        Ok(Self { config })
    }

    pub fn into_handle(self) -> AgentHandle {
        let (tx, mut rx) = mpsc::channel::<Request>(32);
        let config = Arc::new(self.config);
        let running = RunningPrompts::default();

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    Request::OpenConversation { reply } => {
                        // Processes are per prompt; the id only groups cancels
                        let id = ConversationId(uuid::Uuid::new_v4().to_string());
                        let _ = reply.send(Ok(id));
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

                        let config = Arc::clone(&config);
                        let running = running.clone();
                        tokio::spawn(async move {
                            if let Err(e) = run_prompt(&config, text, &events, kill).await {
                                tracing::error!(prompt = %id, error = %e, "Model command failed");
                                let _ = events
                                    .send(AgentEvent::failed(FailureKind::Backend, e.to_string()))
                                    .await;
                            }
                            running.finish(id);
                        });
                    }
                    Request::Cancel { target, reply } => {
                        let cancelled = running.cancel(&target);
                        if !cancelled.is_empty() {
                            tracing::debug!(?target, count = cancelled.len(), "Cancelling model commands");
                        }
                        let _ = reply.send(cancelled.len());
                    }
                }
            }
        });

        AgentHandle::new(tx, "command")
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::BackendFactory {
        Box::new(|config| {
            let cfg: CommandConfig = serde_json::from_value(config.clone())
                .context("Invalid command backend config")?;
            Ok(CommandBackend::new(cfg)?.into_handle())
        })
    }
}

async fn feed_stdin(mut stdin: ChildStdin, text: String) -> std::io::Result<()> {
    stdin.write_all(text.as_bytes()).await?;
    stdin.shutdown().await
}

async fn run_prompt(
    config: &CommandConfig,
    text: String,
    events: &mpsc::Sender<AgentEvent>,
    mut kill: oneshot::Receiver<()>,
) -> Result<()> {
    tracing::debug!(program = %config.program, args = ?config.args, bytes = text.len(), "Spawning model command");

    let mut command = ProcessCommand::new(&config.program);
    command
        .args(&config.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn `{}`", config.program))?;

    let stdin = child.stdin.take().context("Failed to capture stdin")?;
    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let mut stderr = child.stderr.take().context("Failed to capture stderr")?;

    // Writer and readers run together so neither side fills a pipe and stalls
    let writer = tokio::spawn(feed_stdin(stdin, text));
    let stderr_reader = tokio::spawn(async move {
        let mut buf = String::new();
        let _ = stderr.read_to_string(&mut buf).await;
        buf
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut reply = String::new();
    let mut kill_armed = true;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdout")? else {
                    break;
                };
                if !reply.is_empty() {
                    reply.push('\n');
                }
                reply.push_str(&line);
                if events.send(AgentEvent::Chunk(format!("{}\n", line))).await.is_err() {
                    tracing::debug!("Prompt stream dropped, stopping command");
                    writer.abort();
                    stderr_reader.abort();
                    child.kill().await.context("Failed to kill model command")?;
                    return Ok(());
                }
            }
            signal = &mut kill, if kill_armed => {
                if signal.is_err() {
                    // Switch dropped without firing; keep streaming
                    kill_armed = false;
                    continue;
                }
                writer.abort();
                stderr_reader.abort();
                child.kill().await.context("Failed to kill model command")?;
                let _ = events.send(AgentEvent::failed(FailureKind::Cancelled, "")).await;
                return Ok(());
            }
        }
    }

    let status = child.wait().await?;
    match writer.await {
        Ok(Err(e)) => tracing::debug!(error = %e, "Model command closed stdin early"),
        Err(e) => tracing::debug!(error = %e, "Stdin writer did not finish"),
        Ok(Ok(())) => {}
    }
    let stderr_text = stderr_reader.await.unwrap_or_default();
    if !stderr_text.trim().is_empty() {
        tracing::warn!(stderr = %stderr_text.trim(), "Model command stderr");
    }

    let event = if status.success() {
        AgentEvent::done(reply.trim())
    } else {
        AgentEvent::failed(
            classify_failure(&stderr_text),
            format!(
                "`{}` exited with status {:?}: {}",
                config.program,
                status.code(),
                stderr_text.trim()
            ),
        )
    };
    let _ = events.send(event).await;
    Ok(())
}

fn classify_failure(stderr: &str) -> FailureKind {
    let lower = stderr.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        FailureKind::Timeout
    } else if lower.contains("rate limit") {
        FailureKind::RateLimited
    } else if lower.contains("unauthorized") || lower.contains("api key") {
        FailureKind::AuthFailed
    } else {
        FailureKind::Backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert_eq!(classify_failure("request timed out"), FailureKind::Timeout);
        assert_eq!(classify_failure("Rate limit exceeded"), FailureKind::RateLimited);
        assert_eq!(classify_failure("missing API key"), FailureKind::AuthFailed);
        assert_eq!(classify_failure("segfault"), FailureKind::Backend);
    }

    #[test]
    fn test_empty_program_rejected() {
        let result = CommandBackend::new(CommandConfig {
            program: "  ".to_string(),
            args: vec![],
            working_dir: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_config_defaults() {
        let cfg: CommandConfig = serde_json::from_value(serde_json::json!({"program": "cat"})).unwrap();
        assert_eq!(cfg.program, "cat");
        assert!(cfg.args.is_empty());
        assert!(cfg.working_dir.is_none());
    }
}
