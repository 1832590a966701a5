// ABOUTME: Command model - named commands gated by domain accessibility and privilege
// ABOUTME: Atom values, the Command trait and the environment commands execute against

pub mod builtin;
pub mod parse;
pub mod registry;

use crate::domain::DomainKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use builtin::{HelpCommand, InfoCommand};
pub use parse::{parse_message, CommandLine, ParseResult};
pub use registry::CommandRegistry;

/// Tagged unit/value/error result used uniformly across the command layer
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Atom>),
    /// The command ran but failed
    Error(String),
}

impl Atom {
    pub fn text(text: impl Into<String>) -> Self {
        Atom::Text(text.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Atom::Error(message.into())
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Atom::Unit)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Atom::Error(_))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Atom::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interpret one command-line argument: integer, float, bool, else text
    pub fn parse_arg(arg: &str) -> Self {
        if let Ok(i) = arg.parse::<i64>() {
            Atom::Int(i)
        } else if let Ok(f) = arg.parse::<f64>() {
            Atom::Float(f)
        } else {
            match arg {
                "true" => Atom::Bool(true),
                "false" => Atom::Bool(false),
                _ => Atom::Text(arg.to_string()),
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Unit => f.write_str("()"),
            Atom::Bool(b) => write!(f, "{}", b),
            Atom::Int(i) => write!(f, "{}", i),
            Atom::Float(x) => write!(f, "{}", x),
            Atom::Text(s) => f.write_str(s),
            Atom::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Atom::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Which kinds of domains a command may be invoked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessibleDomain {
    Private,
    Group,
    All,
}

impl AccessibleDomain {
    pub fn admits(&self, kind: DomainKind) -> bool {
        match self {
            AccessibleDomain::All => true,
            AccessibleDomain::Private => kind == DomainKind::Private,
            AccessibleDomain::Group => kind == DomainKind::Group,
        }
    }
}

/// Caller privilege, ordered from least to most trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Privilege {
    Normal,
    Elevated,
    Owner,
}

/// Name/help/gates of a registered command, for listings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSummary {
    pub name: String,
    pub help: String,
    pub accessible_domain: AccessibleDomain,
    pub privilege: Privilege,
}

/// Where command output lines go
pub type LogSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Context a command executes against
#[derive(Clone)]
pub struct CommandEnvironment {
    pub accessibility: DomainKind,
    pub privilege: Privilege,
    /// Commands visible to the caller, for `Help`
    pub catalog: Vec<CommandSummary>,
    log: LogSink,
}

impl CommandEnvironment {
    pub fn new<F>(accessibility: DomainKind, privilege: Privilege, log: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            accessibility,
            privilege,
            catalog: Vec::new(),
            log: Arc::new(log),
        }
    }

    pub fn with_catalog(mut self, catalog: Vec<CommandSummary>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn log(&self, line: &str) {
        (self.log)(line)
    }
}

impl fmt::Debug for CommandEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEnvironment")
            .field("accessibility", &self.accessibility)
            .field("privilege", &self.privilege)
            .field("catalog", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

/// A stateless, named command
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    fn help(&self) -> &str;

    fn accessible_domain(&self) -> AccessibleDomain {
        AccessibleDomain::All
    }

    fn privilege(&self) -> Privilege {
        Privilege::Normal
    }

    async fn execute(&self, env: &CommandEnvironment, args: &[Atom]) -> Atom;

    fn summary(&self) -> CommandSummary {
        CommandSummary {
            name: self.name().to_string(),
            help: self.help().to_string(),
            accessible_domain: self.accessible_domain(),
            privilege: self.privilege(),
        }
    }
}
