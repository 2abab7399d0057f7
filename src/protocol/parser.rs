//! Line Command Parser
//!
//! Turns one line of client input into a [`Command`].
//!
//! ## Rules
//!
//! 1. Surrounding whitespace is trimmed and the line is split on runs of whitespace.
//! 2. A line with no tokens is an [`ParseError::EmptyExpression`].
//! 3. The first token, upper-cased, must be `SET`, `GET` or `DEL`.
//! 4. Every remaining token must match `^[A-Za-z0-9_-]*$`.
//!
//! Arity is not checked here. `SET a` parses fine and is rejected by the
//! dispatcher, which knows the per-command argument count.
//!
//! The parser holds no state, so a single instance can be shared by every
//! connection without locking.

use crate::protocol::types::{Command, CommandKind};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Characters allowed in keys and values.
static ARGUMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_\-]*$").expect("argument pattern is a valid regex")
});

/// Errors that can occur while parsing a command line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The line contained only whitespace
    #[error("empty expression")]
    EmptyExpression,

    /// The first token is not a recognized command
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// An argument contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid argument '{0}': must be alphanumeric")]
    InvalidArgument(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Turns a raw line into a structured command.
///
/// Production code wires [`StrictParser`]; tests may substitute their own.
pub trait CommandParser: Send + Sync {
    /// Parses a single line. Must be free of side effects.
    fn parse(&self, line: &str) -> ParseResult<Command>;
}

/// The production parser: whitespace tokenizer plus strict argument validation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictParser;

impl StrictParser {
    /// Creates a new parser instance.
    pub fn new() -> Self {
        Self
    }
}

impl CommandParser for StrictParser {
    fn parse(&self, line: &str) -> ParseResult<Command> {
        let mut tokens = line.split_whitespace();

        let name = tokens.next().ok_or(ParseError::EmptyExpression)?;
        let kind: CommandKind = name
            .parse()
            .map_err(|_| ParseError::UnknownCommand(name.to_string()))?;

        let args = tokens
            .map(|arg| {
                if ARGUMENT_PATTERN.is_match(arg) {
                    Ok(arg.to_string())
                } else {
                    Err(ParseError::InvalidArgument(arg.to_string()))
                }
            })
            .collect::<ParseResult<Vec<_>>>()?;

        Ok(Command::new(kind, args))
    }
}

/// Convenience function to parse a line with the default parser.
pub fn parse_line(line: &str) -> ParseResult<Command> {
    StrictParser.parse(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_set() {
        let cmd = parse_line("SET key value").unwrap();
        assert_eq!(cmd, Command::new(CommandKind::Set, args(&["key", "value"])));
    }

    #[test]
    fn test_parse_get() {
        let cmd = parse_line("GET key").unwrap();
        assert_eq!(cmd, Command::new(CommandKind::Get, args(&["key"])));
    }

    #[test]
    fn test_parse_del() {
        let cmd = parse_line("DEL key").unwrap();
        assert_eq!(cmd, Command::new(CommandKind::Del, args(&["key"])));
    }

    #[test]
    fn test_parse_lowercase_name_is_canonicalized() {
        let cmd = parse_line("set user_1 some-value").unwrap();
        assert_eq!(cmd.kind, CommandKind::Set);
        assert_eq!(cmd.args, args(&["user_1", "some-value"]));
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let cmd = parse_line("  GET \t  key  \r\n").unwrap();
        assert_eq!(cmd, Command::new(CommandKind::Get, args(&["key"])));
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_line(""), Err(ParseError::EmptyExpression));
        assert_eq!(parse_line("   \t "), Err(ParseError::EmptyExpression));
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse_line("UNKNOWN key"),
            Err(ParseError::UnknownCommand("UNKNOWN".to_string()))
        );
    }

    #[test]
    fn test_parse_invalid_argument() {
        assert_eq!(
            parse_line("SET key! value!"),
            Err(ParseError::InvalidArgument("key!".to_string()))
        );
    }

    #[test]
    fn test_parse_keeps_wrong_arity() {
        // Arity is the dispatcher's concern
        let cmd = parse_line("GET a b c").unwrap();
        assert_eq!(cmd.args.len(), 3);

        let cmd = parse_line("DEL").unwrap();
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ParseError::EmptyExpression.to_string(), "empty expression");
        assert_eq!(
            ParseError::UnknownCommand("PING".into()).to_string(),
            "unknown command 'PING'"
        );
    }
}
