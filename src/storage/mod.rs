//! Storage Engine Module
//!
//! This module provides the key-value backend for linekv.
//! The dispatcher depends on it only through the [`Storage`] trait, so tests
//! can plug in a fake and the server wires [`InMemoryEngine`].
//!
//! ## Features
//!
//! - **Sharded Storage**: independent shards reduce lock contention
//! - **RwLock**: Multiple concurrent readers, exclusive writers
//! - **Infallible**: `set`, `get` and `delete` cannot fail

pub mod engine;

// Re-export commonly used types
pub use engine::{InMemoryEngine, Storage, StorageStats};
