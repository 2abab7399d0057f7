//! Thread-Safe In-Memory Storage Engine
//!
//! This module implements the key-value backend used by the dispatcher.
//!
//! ## Design Decisions
//!
//! 1. **Narrow Contract**: Callers only see [`Storage`] (`set`, `get`, `delete`).
//! 2. **Sharded Locks**: Instead of one big lock, keys are spread over shards.
//! 3. **RwLock**: Concurrent readers within a shard, exclusive writers.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     InMemoryEngine                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation on a key takes exactly one shard lock, so calls on the
//! same key are linearizable.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 16;

/// The storage contract consumed by the dispatcher.
///
/// All three operations must be safe to call concurrently from many
/// connection tasks. None of them can fail.
pub trait Storage: Send + Sync {
    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str);

    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Removes `key`. Does nothing if the key is absent.
    fn delete(&self, key: &str);
}

/// Operation counters for the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<String, String>>,
}

/// The production storage backend.
///
/// Designed to be wrapped in an `Arc` and shared across all connection tasks.
///
/// # Example
///
/// ```
/// use linekv::storage::{InMemoryEngine, Storage};
///
/// let engine = InMemoryEngine::new();
/// engine.set("name", "Ariz");
/// assert_eq!(engine.get("name"), Some("Ariz".to_string()));
///
/// engine.delete("name");
/// assert_eq!(engine.get("name"), None);
/// ```
pub struct InMemoryEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total number of keys
    key_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: total DEL operations
    del_count: AtomicU64,
}

impl std::fmt::Debug for InMemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    /// Creates an empty engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
        }
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &str) -> &Shard {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % NUM_SHARDS]
    }

    /// Returns the number of keys stored.
    pub fn len(&self) -> usize {
        self.key_count.load(Ordering::Relaxed) as usize
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
        }
    }
}

impl Storage for InMemoryEngine {
    fn set(&self, key: &str, value: &str) {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.get_shard(key).data.write().unwrap();
        if data.insert(key.to_string(), value.to_string()).is_none() {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let data = self.get_shard(key).data.read().unwrap();
        data.get(key).cloned()
    }

    fn delete(&self, key: &str) {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let mut data = self.get_shard(key).data.write().unwrap();
        if data.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
        }
    }
}
