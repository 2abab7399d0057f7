//! # linekv - A Minimal Line-Protocol Key-Value Server
//!
//! linekv is a single-node, in-memory key-value store reachable over a
//! newline-delimited text protocol on TCP.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: a hard cap on simultaneous clients, excess connections are dropped
//! - **Idle Timeouts**: connections that stay silent too long are closed by the server
//! - **Graceful Shutdown**: no new connections after the signal, in-flight ones are drained
//! - **Query Metrics**: total, succeeded, failed and running mean latency
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              linekv                                     │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │   Server    │───>│ Connection  │───>│  Command    │                  │
//! │  │ (Listener + │    │  Handler    │    │  Handler    │                  │
//! │  │  Semaphore) │    └─────────────┘    └──────┬──────┘                  │
//! │  └─────────────┘                              │                         │
//! │                                               ▼                         │
//! │  ┌─────────────┐    ┌──────────────────────────────────────────────┐   │
//! │  │   Line      │    │           dyn Storage                        │   │
//! │  │   Parser    │    │  (InMemoryEngine: sharded RwLock<HashMap>)   │   │
//! │  └─────────────┘    └──────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use linekv::commands::CommandHandler;
//! use linekv::config::NetworkConfig;
//! use linekv::protocol::StrictParser;
//! use linekv::server::Server;
//! use linekv::storage::InMemoryEngine;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let handler = CommandHandler::new(
//!         Arc::new(StrictParser::new()),
//!         Arc::new(InMemoryEngine::new()),
//!     );
//!     let server = Server::bind(&NetworkConfig::default(), handler).await?;
//!
//!     let (shutdown_tx, shutdown_rx) = watch::channel(false);
//!     let serving = tokio::spawn(server.serve(shutdown_rx));
//!
//!     tokio::signal::ctrl_c().await?;
//!     let _ = shutdown_tx.send(true);
//!     let _ = serving.await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `SET key value` -> `OK`
//! - `GET key` -> the value, or `NOT FOUND`
//! - `DEL key` -> `OK`
//!
//! Failures are answered with `Error: <message>`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Line parser and command types
//! - [`storage`]: The storage contract and the in-memory engine
//! - [`commands`]: Command dispatch and query metrics
//! - [`connection`]: Per-client connection handling
//! - [`server`]: Listener, admission control and shutdown
//! - [`config`]: YAML configuration
//! - [`logging`]: Subscriber setup

pub mod commands;
pub mod config;
pub mod connection;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::{CommandHandler, ExecError, MetricsSnapshot};
pub use config::Config;
pub use connection::{handle_connection, ConnectionLimits, ConnectionStats};
pub use protocol::{Command, CommandKind, CommandParser, ParseError, StrictParser};
pub use server::Server;
pub use storage::{InMemoryEngine, Storage};

/// The default config file read by the server
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Version of linekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
