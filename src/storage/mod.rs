//! Storage abstractions for the key store.
//!
//! The key store talks to a byte-oriented [`KeyValueStore`]. The primary
//! backend is RocksDB; when the database cannot be opened the process
//! continues on an in-memory store in degraded mode, so key operations
//! keep working for the lifetime of the process even without durability.

pub mod rocksdb;

pub use rocksdb::{RocksDbConfig, RocksDbStore};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::{QpgError, Result};

/// A byte-oriented key-value store.
pub trait KeyValueStore: Send + Sync {
    /// Loads the value at a key, if present.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores a value at a key, replacing any previous value.
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a key. Removing an absent key is not an error.
    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Lists all stored keys.
    fn keys(&self) -> Result<Vec<Vec<u8>>>;

    /// Approximate total size of stored keys and values in bytes.
    fn bytes_used(&self) -> Result<u64>;
}

/// Volatile in-memory store, used as the degraded-mode fallback and in
/// tests.
pub struct MemoryStore {
    entries: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| QpgError::storage("Memory store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn bytes_used(&self) -> Result<u64> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum())
    }
}

/// Opens the RocksDB backend at the given path, falling back to an
/// in-memory store when it cannot be opened.
///
/// Returns the store and whether it is running in degraded (volatile)
/// mode. The fallback is logged once, here.
pub fn open_with_fallback(path: impl AsRef<Path>) -> (Box<dyn KeyValueStore>, bool) {
    match RocksDbStore::open(path.as_ref(), &RocksDbConfig::default()) {
        Ok(store) => {
            info!(path = %path.as_ref().display(), "Opened persistent key storage");
            (Box::new(store), false)
        }
        Err(e) => {
            warn!(
                path = %path.as_ref().display(),
                error = %e,
                "Persistent storage unavailable, continuing with volatile in-memory store"
            );
            (Box::new(MemoryStore::new()), true)
        }
    }
}
