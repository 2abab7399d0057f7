//! Command Handler Module
//!
//! This module implements the compute layer for linekv.
//! It receives raw request lines, parses them, executes them against the
//! storage backend, and tracks per-query metrics.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Measure      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Storage      │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;
pub mod metrics;

pub use handler::{CommandHandler, ExecError};
pub use metrics::{MetricsSnapshot, QueryMetrics};
