// ABOUTME: Command registry and dispatcher
// ABOUTME: Looks commands up by exact name and enforces accessibility/privilege before executing

use super::{Atom, Command, CommandEnvironment, CommandSummary, HelpCommand, InfoCommand};
use crate::error::CommandError;
use crate::metrics;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named commands, iterated in name order
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in `Info` and `Help` commands
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.commands.insert("Info".to_string(), Arc::new(InfoCommand));
        registry.commands.insert("Help".to_string(), Arc::new(HelpCommand));
        registry
    }

    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<(), CommandError> {
        let name = command.name().to_string();
        if self.commands.contains_key(&name) {
            return Err(CommandError::DuplicateName(name));
        }
        tracing::debug!(command = %name, "Registered command");
        self.commands.insert(name, command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn summaries(&self) -> Vec<CommandSummary> {
        self.commands.values().map(|c| c.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run `name` against `env` if the environment passes its gates.
    ///
    /// A gate failure never reaches `execute`. A command that runs but fails
    /// reports that in its `Atom`, which is returned as-is.
    pub async fn dispatch(
        &self,
        name: &str,
        args: &[Atom],
        env: &CommandEnvironment,
    ) -> Result<Atom, CommandError> {
        let result = self.gate(name, env);
        let command = match result {
            Ok(command) => command,
            Err(e) => {
                metrics::record_command(rejected_label(name, &e), e.kind());
                tracing::info!(command = %name, error = %e, "Command rejected");
                return Err(e);
            }
        };

        tracing::debug!(command = %name, args = args.len(), privilege = ?env.privilege, "Executing command");
        let atom = command.execute(env, args).await;
        metrics::record_command(name, if atom.is_error() { "failed" } else { "ok" });
        Ok(atom)
    }

    fn gate(&self, name: &str, env: &CommandEnvironment) -> Result<Arc<dyn Command>, CommandError> {
        let command = self
            .get(name)
            .ok_or_else(|| CommandError::NotFound(name.to_string()))?;

        let allowed = command.accessible_domain();
        if !allowed.admits(env.accessibility) {
            return Err(CommandError::Forbidden {
                command: name.to_string(),
                allowed,
                actual: env.accessibility,
            });
        }

        let required = command.privilege();
        if env.privilege < required {
            return Err(CommandError::InsufficientPrivilege {
                command: name.to_string(),
                required,
                actual: env.privilege,
            });
        }

        Ok(command)
    }
}

/// Metric label for a rejected dispatch. Unregistered names are user input.
fn rejected_label<'a>(name: &'a str, error: &CommandError) -> &'a str {
    match error {
        CommandError::NotFound(_) => metrics::UNKNOWN_COMMAND,
        _ => name,
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AccessibleDomain, Privilege};
    use crate::domain::DomainKind;
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Command for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn help(&self) -> &str {
            "test command"
        }

        fn accessible_domain(&self) -> AccessibleDomain {
            AccessibleDomain::Group
        }

        async fn execute(&self, _env: &CommandEnvironment, _args: &[Atom]) -> Atom {
            Atom::Unit
        }
    }

    #[test]
    fn test_builtins_present() {
        let registry = CommandRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["Help", "Info"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Named("ping"))).unwrap();
        let err = registry.register(Arc::new(Named("ping"))).unwrap_err();
        assert_eq!(err, CommandError::DuplicateName("ping".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Named("ping"))).unwrap();
        registry.register(Arc::new(Named("Ping"))).unwrap();
        assert!(registry.get("PING").is_none());
    }

    #[test]
    fn test_summaries_carry_gates() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Named("ping"))).unwrap();
        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].accessible_domain, AccessibleDomain::Group);
        assert_eq!(summaries[0].privilege, Privilege::Normal);
    }

    #[tokio::test]
    async fn test_dispatch_forbidden_in_private() {
        let mut registry = CommandRegistry::new();
        registry.register(Arc::new(Named("ping"))).unwrap();
        let env = CommandEnvironment::new(DomainKind::Private, Privilege::Owner, |_| {});
        let err = registry.dispatch("ping", &[], &env).await.unwrap_err();
        assert_eq!(err.kind(), "CommandForbidden");
    }

    #[test]
    fn test_unregistered_names_share_one_metric_label() {
        let not_found = CommandError::NotFound("x9f2".to_string());
        assert_eq!(rejected_label("x9f2", &not_found), "unknown");

        let denied = CommandError::DuplicateName("Info".to_string());
        assert_eq!(rejected_label("Info", &denied), "Info");
    }
}
