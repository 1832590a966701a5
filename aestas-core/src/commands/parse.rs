// ABOUTME: Command-line parsing for chat messages
// ABOUTME: Recognizes `<prefix>name args`, quoted arguments and the doubled-prefix escape

use super::Atom;

/// Default command prefix
pub const DEFAULT_PREFIX: &str = "/";

/// A command invocation parsed from a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// The command name (without prefix), case preserved
    pub name: String,
    /// Parsed arguments (handles quoted strings)
    pub args: Vec<String>,
    /// The raw argument string after the command name
    pub raw_args: String,
}

impl CommandLine {
    pub fn new(name: impl Into<String>, args: Vec<String>, raw_args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args,
            raw_args: raw_args.into(),
        }
    }

    pub fn first_arg(&self) -> Option<&str> {
        self.args.first().map(|s| s.as_str())
    }

    /// Arguments converted for dispatch
    pub fn atoms(&self) -> Vec<Atom> {
        self.args.iter().map(|arg| Atom::parse_arg(arg)).collect()
    }
}

/// Result of parsing a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult {
    /// A command was recognized
    Command(CommandLine),
    /// A regular message (not a command)
    Message(String),
    /// Message should be ignored (empty, bare escape, etc.)
    Ignore,
}

impl ParseResult {
    pub fn is_command(&self) -> bool {
        matches!(self, ParseResult::Command(_))
    }

    pub fn is_message(&self) -> bool {
        matches!(self, ParseResult::Message(_))
    }

    pub fn is_ignore(&self) -> bool {
        matches!(self, ParseResult::Ignore)
    }

    pub fn as_command(&self) -> Option<&CommandLine> {
        match self {
            ParseResult::Command(cmd) => Some(cmd),
            _ => None,
        }
    }
}

/// Parse arguments from a string, respecting quoted strings
fn parse_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut quote_char = '"';

    for c in input.chars() {
        match c {
            '"' | '\'' if !in_quotes => {
                in_quotes = true;
                quote_char = c;
            }
            c if c == quote_char && in_quotes => {
                in_quotes = false;
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

/// Parse a chat message to determine if it's a command
///
/// # Command Recognition
/// `{prefix}name args...` where the name starts with an alphabetic character.
///
/// # Escape Sequences
/// - Messages starting with the prefix twice are regular messages with one
///   prefix stripped (`//not a command` -> `/not a command`)
/// - Empty messages are ignored
pub fn parse_message(body: &str, prefix: &str) -> ParseResult {
    let trimmed = body.trim();

    if trimmed.is_empty() {
        return ParseResult::Ignore;
    }

    if prefix.is_empty() {
        return ParseResult::Message(trimmed.to_string());
    }

    if let Some(escaped) = trimmed
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix(prefix))
    {
        let escaped = escaped.trim();
        if escaped.is_empty() {
            return ParseResult::Ignore;
        }
        return ParseResult::Message(format!("{}{}", prefix, escaped));
    }

    if let Some(after_prefix) = trimmed.strip_prefix(prefix) {
        if after_prefix.chars().next().is_some_and(|c| c.is_alphabetic()) {
            return parse_command_from_text(after_prefix);
        }
    }

    ParseResult::Message(trimmed.to_string())
}

fn parse_command_from_text(text: &str) -> ParseResult {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or_default().to_string();
    let raw_args = parts.next().map(str::trim).unwrap_or("").to_string();
    let args = parse_args(&raw_args);

    ParseResult::Command(CommandLine::new(name, args, raw_args))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let result = parse_message("/Help", "/");
        assert!(matches!(
            result,
            ParseResult::Command(ref cmd) if cmd.name == "Help"
        ));
    }

    #[test]
    fn test_parse_command_with_args() {
        match parse_message("/echo 42 tea", "/") {
            ParseResult::Command(cmd) => {
                assert_eq!(cmd.name, "echo");
                assert_eq!(cmd.args, vec!["42", "tea"]);
                assert_eq!(cmd.raw_args, "42 tea");
                assert_eq!(cmd.atoms(), vec![Atom::Int(42), Atom::text("tea")]);
            }
            other => panic!("Expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_custom_prefix() {
        let result = parse_message("!!Info", "!!");
        assert_eq!(result.as_command().map(|c| c.name.as_str()), Some("Info"));

        let result = parse_message("/Info", "!!");
        assert!(result.is_message());
    }

    #[test]
    fn test_parse_escape_sequence() {
        match parse_message("//not a command", "/") {
            ParseResult::Message(msg) => assert_eq!(msg, "/not a command"),
            other => panic!("Expected message, got {:?}", other),
        }
        assert!(parse_message("//", "/").is_ignore());
    }

    #[test]
    fn test_parse_regular_message() {
        assert_eq!(
            parse_message("  hello world ", "/"),
            ParseResult::Message("hello world".to_string())
        );
    }

    #[test]
    fn test_parse_empty_message() {
        assert!(parse_message("", "/").is_ignore());
        assert!(parse_message("   ", "/").is_ignore());
    }

    #[test]
    fn test_parse_prefix_without_name() {
        assert!(parse_message("/", "/").is_message());
        assert!(parse_message("/ help", "/").is_message());
        assert!(parse_message("/42", "/").is_message());
    }

    #[test]
    fn test_parse_quoted_args() {
        match parse_message("/Help \"two words\" 'and more' x", "/") {
            ParseResult::Command(cmd) => {
                assert_eq!(cmd.args, vec!["two words", "and more", "x"]);
            }
            other => panic!("Expected command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_prefix_never_commands() {
        assert!(parse_message("Info", "").is_message());
    }
}
