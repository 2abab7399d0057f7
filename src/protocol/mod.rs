//! Line Protocol Implementation
//!
//! This module provides the textual, newline-delimited protocol spoken by
//! linekv clients.
//!
//! ## Modules
//!
//! - `types`: Defines [`Command`] and [`CommandKind`]
//! - `parser`: The [`CommandParser`] trait and the strict production parser
//!
//! ## Example
//!
//! ```
//! use linekv::protocol::{parse_line, CommandKind};
//!
//! let cmd = parse_line("set name Ariz").unwrap();
//! assert_eq!(cmd.kind, CommandKind::Set);
//! assert_eq!(cmd.args, vec!["name", "Ariz"]);
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{parse_line, CommandParser, ParseError, ParseResult, StrictParser};
pub use types::{Command, CommandKind, NOT_FOUND, OK};
