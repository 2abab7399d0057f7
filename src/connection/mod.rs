//! Connection Handler Module
//!
//! This module manages individual client connections to linekv.
//! Each accepted socket is handled by its own async task that holds a
//! capacity permit until the socket closes.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Server (listener)                       │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ accept() + try_acquire_owned()
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 ConnectionHandler                           │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │ Read line   │───>│ Execute     │───>│ Write line  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Idle Timeout**: every read is bounded by the configured deadline
//! - **Line Framing**: requests accumulate in a `BytesMut` until `\n`
//! - **Cooperative Shutdown**: the shutdown flag is checked after each command
//! - **Statistics**: Tracks connection and command counters

pub mod handler;

// Re-export commonly used types
pub use handler::{
    handle_connection, ConnectionError, ConnectionHandler, ConnectionLimits, ConnectionStats,
};
