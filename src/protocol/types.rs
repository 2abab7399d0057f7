//! Command Types
//!
//! This module defines the structured form of a client request.
//! One line of text sent by a client becomes exactly one [`Command`].
//!
//! ## Wire Format
//!
//! ```text
//! Client -> Server:  <COMMAND> <arg1> [<arg2>]\n
//! Server -> Client:  <result>\n  |  Error: <message>\n
//! ```
//!
//! ## Examples
//!
//! `SET name Ariz` -> `OK`
//! `GET name`      -> `Ariz`
//! `GET missing`   -> `NOT FOUND`
//! `DEL name`      -> `OK`

use std::fmt;
use std::str::FromStr;

/// The line terminator used by the protocol
pub const LF: u8 = b'\n';

/// Response sent for a successful SET or DEL
pub const OK: &str = "OK";

/// Response sent for a GET on an absent key
pub const NOT_FOUND: &str = "NOT FOUND";

/// The three recognized command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// `SET key value` - stores a value, overwriting unconditionally
    Set,
    /// `GET key` - reads a value
    Get,
    /// `DEL key` - removes a key, no-op if absent
    Del,
}

impl CommandKind {
    /// Returns the canonical upper-case name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Set => "SET",
            CommandKind::Get => "GET",
            CommandKind::Del => "DEL",
        }
    }

    /// Number of arguments this command takes.
    pub fn arity(&self) -> usize {
        match self {
            CommandKind::Set => 2,
            CommandKind::Get | CommandKind::Del => 1,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = ();

    /// Matches a command name case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SET" => Ok(CommandKind::Set),
            "GET" => Ok(CommandKind::Get),
            "DEL" => Ok(CommandKind::Del),
            _ => Err(()),
        }
    }
}

/// A parsed client request.
///
/// A `Command` can only be built from a recognized [`CommandKind`], so an
/// unknown name never gets past the parser. Arity is checked later by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Which operation to run
    pub kind: CommandKind,
    /// Arguments in the order the client sent them
    pub args: Vec<String>,
}

impl Command {
    /// Creates a new command.
    pub fn new(kind: CommandKind, args: Vec<String>) -> Self {
        Self { kind, args }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.as_str())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}
