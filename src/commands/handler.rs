//! Command Handler Module
//!
//! This module implements the compute layer for linekv.
//! It takes one raw request line, parses it, validates arity, runs it
//! against the storage backend and records the outcome in [`QueryMetrics`].
//!
//! ## Supported Commands
//!
//! - `SET key value` - Set a key, replies `OK`
//! - `GET key` - Get a key's value, replies `NOT FOUND` if absent
//! - `DEL key` - Delete a key, replies `OK` even if absent
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│   arity     │───>│ dispatch()  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      dyn Storage            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::metrics::{MetricsSnapshot, QueryMetrics};
use crate::protocol::{Command, CommandKind, CommandParser, ParseError, NOT_FOUND, OK};
use crate::storage::Storage;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info};

/// Errors returned by [`CommandHandler::execute`].
///
/// The `Display` text is what the client sees after `Error: `.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecError {
    /// The line could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The command got the wrong number of arguments
    #[error("wrong number of arguments for '{command}': expected {expected}, got {got}")]
    Arity {
        command: CommandKind,
        expected: usize,
        got: usize,
    },

    /// The backend failed. The in-memory engine never produces this.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Parses and executes request lines.
///
/// Cloning is cheap: all clones share the same parser, storage and metrics,
/// so one clone can be handed to every connection.
#[derive(Clone)]
pub struct CommandHandler {
    parser: Arc<dyn CommandParser>,
    storage: Arc<dyn Storage>,
    metrics: Arc<QueryMetrics>,
}

impl CommandHandler {
    /// Creates a new command handler with fresh metrics.
    pub fn new(parser: Arc<dyn CommandParser>, storage: Arc<dyn Storage>) -> Self {
        Self {
            parser,
            storage,
            metrics: Arc::new(QueryMetrics::new()),
        }
    }

    /// Executes one request line and returns the response text.
    ///
    /// `total` is incremented exactly once per call, and exactly one of
    /// `succeeded`/`failed` along with it.
    pub fn execute(&self, line: &str) -> Result<String, ExecError> {
        let start = Instant::now();

        let result = self
            .parser
            .parse(line)
            .map_err(ExecError::from)
            .and_then(|command| self.dispatch(&command).map(|out| (command, out)));

        self.metrics.record(result.is_ok(), start.elapsed());

        match result {
            Ok((command, response)) => {
                info!(command = %command.kind, args = ?command.args, "Executed command");
                Ok(response)
            }
            Err(e) => {
                error!(input = %line.trim(), error = %e, "Failed to execute query");
                Err(e)
            }
        }
    }

    /// Returns a snapshot of the query metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Checks arity and routes a command to the storage backend.
    fn dispatch(&self, command: &Command) -> Result<String, ExecError> {
        let expected = command.kind.arity();
        if command.args.len() != expected {
            return Err(ExecError::Arity {
                command: command.kind,
                expected,
                got: command.args.len(),
            });
        }

        let args = &command.args;
        let response = match command.kind {
            CommandKind::Set => {
                self.storage.set(&args[0], &args[1]);
                OK.to_string()
            }
            CommandKind::Get => self
                .storage
                .get(&args[0])
                .unwrap_or_else(|| NOT_FOUND.to_string()),
            CommandKind::Del => {
                self.storage.delete(&args[0]);
                OK.to_string()
            }
        };

        Ok(response)
    }
}

impl std::fmt::Debug for CommandHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHandler")
            .field("metrics", &self.metrics.snapshot())
            .finish()
    }
}
