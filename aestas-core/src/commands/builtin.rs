// ABOUTME: Built-in commands available in every registry
// ABOUTME: Info reports the host system, Help lists the caller's command catalog

use super::{Atom, Command, CommandEnvironment};
use async_trait::async_trait;

/// Logs OS, architecture, CPU count and runtime version
pub struct InfoCommand;

#[async_trait]
impl Command for InfoCommand {
    fn name(&self) -> &str {
        "Info"
    }

    fn help(&self) -> &str {
        "Show information about the host system"
    }

    async fn execute(&self, env: &CommandEnvironment, _args: &[Atom]) -> Atom {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        env.log(&format!("OS: {}", std::env::consts::OS));
        env.log(&format!("Arch: {}", std::env::consts::ARCH));
        env.log(&format!("CPUs: {}", cpus));
        env.log(&format!("Version: aestas {}", env!("CARGO_PKG_VERSION")));
        Atom::Unit
    }
}

/// Lists commands from the environment's catalog
pub struct HelpCommand;

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        "Help"
    }

    fn help(&self) -> &str {
        "List commands, or describe one: Help [name]"
    }

    async fn execute(&self, env: &CommandEnvironment, args: &[Atom]) -> Atom {
        match args.first() {
            None => {
                for entry in &env.catalog {
                    env.log(&format!("{} - {}", entry.name, entry.help));
                }
                Atom::Unit
            }
            Some(wanted) => {
                let wanted = wanted.to_string();
                match env.catalog.iter().find(|entry| entry.name == wanted) {
                    Some(entry) => {
                        env.log(&format!("{} - {}", entry.name, entry.help));
                        Atom::Unit
                    }
                    None => Atom::error(format!("No such command: {}", wanted)),
                }
            }
        }
    }
}
