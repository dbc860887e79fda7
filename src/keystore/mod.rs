//! Persistent key store.
//!
//! Stores public key records in the clear and private keys sealed under
//! their owner's passphrase. Records live in a [`KeyValueStore`] under
//! three key shapes:
//!
//! - `pub:{key_id}` a serialized [`PublicKeyRecord`]
//! - `sealed:{key_id}` a serialized [`SealedPrivateKey`]
//! - `index` the list of key IDs in insertion order
//!
//! The index makes listing deterministic regardless of backend iteration
//! order. All compound operations hold the store lock for their full
//! read-modify-write cycle.

use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::crypto::{KeyId, KeyPair, Passphrase, PrivateKeyBundle, PublicKeyRecord, SealedPrivateKey};
use crate::error::{QpgError, Result};
use crate::storage::{open_with_fallback, KeyValueStore, MemoryStore};

/// The insertion-order index record.
const INDEX_KEY: &[u8] = b"index";

/// Key store usage statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of stored key pairs or public records
    pub key_count: usize,
    /// Approximate bytes used by the backend
    pub bytes_used: u64,
    /// True when running on the volatile in-memory fallback
    pub degraded: bool,
}

/// A store of public key records and passphrase-sealed private keys.
pub struct KeyStore {
    store: Mutex<Box<dyn KeyValueStore>>,
    degraded: bool,
}

impl KeyStore {
    /// Opens a key store at the given path.
    ///
    /// Never fails: when the persistent backend cannot be opened the
    /// store runs in degraded in-memory mode, already logged by the
    /// storage layer.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let (store, degraded) = open_with_fallback(path);
        Self {
            store: Mutex::new(store),
            degraded,
        }
    }

    /// Creates a purely in-memory key store.
    pub fn in_memory() -> Self {
        Self {
            store: Mutex::new(Box::new(MemoryStore::new())),
            degraded: false,
        }
    }

    /// True when the store lost its persistent backend and is running on
    /// volatile storage.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Stores a key pair: the public record in the clear, the private
    /// half sealed under the passphrase.
    ///
    /// Re-inserting an existing key ID replaces both records and keeps
    /// the original index position.
    pub fn insert(&self, pair: &KeyPair, passphrase: &Passphrase) -> Result<()> {
        let sealed = SealedPrivateKey::seal(
            pair.key_id,
            pair.private_key_armored.as_bytes(),
            passphrase,
        )?;
        let record = pair.public_record();

        let store = self.lock()?;
        store.set(&public_key_key(pair.key_id), &serialize(&record)?)?;
        store.set(&sealed_key_key(pair.key_id), &serialize(&sealed)?)?;

        let mut index = read_index(store.as_ref())?;
        if !index.contains(&pair.key_id) {
            index.push(pair.key_id);
            store.set(INDEX_KEY, &serialize(&index)?)?;
        }

        info!(key_id = %pair.key_id, user_id = %pair.user_id, "Stored key pair");
        Ok(())
    }

    /// Stores a public record alone, for imported correspondent keys.
    pub fn insert_public(&self, record: &PublicKeyRecord) -> Result<()> {
        let store = self.lock()?;
        store.set(&public_key_key(record.key_id), &serialize(record)?)?;

        let mut index = read_index(store.as_ref())?;
        if !index.contains(&record.key_id) {
            index.push(record.key_id);
            store.set(INDEX_KEY, &serialize(&index)?)?;
        }

        debug!(key_id = %record.key_id, "Stored public key record");
        Ok(())
    }

    /// Loads a public key record.
    pub fn get_public_key(&self, key_id: KeyId) -> Result<PublicKeyRecord> {
        let store = self.lock()?;
        match store.get(&public_key_key(key_id))? {
            Some(bytes) => deserialize(&bytes),
            None => Err(QpgError::key_not_found(format!(
                "No public key with ID {}",
                key_id
            ))),
        }
    }

    /// Lists all public key records in insertion order.
    pub fn list_public_keys(&self) -> Result<Vec<PublicKeyRecord>> {
        let store = self.lock()?;
        let index = read_index(store.as_ref())?;

        let mut records = Vec::with_capacity(index.len());
        for key_id in index {
            if let Some(bytes) = store.get(&public_key_key(key_id))? {
                records.push(deserialize(&bytes)?);
            }
        }
        Ok(records)
    }

    /// True when a sealed private key is stored for this ID.
    pub fn has_private_key(&self, key_id: KeyId) -> Result<bool> {
        let store = self.lock()?;
        Ok(store.get(&sealed_key_key(key_id))?.is_some())
    }

    /// Unseals and reconstructs a private key.
    ///
    /// An unknown key ID reports as not found before the passphrase is
    /// ever checked; a wrong passphrase reports as an authentication
    /// failure.
    pub fn retrieve_private_key(
        &self,
        key_id: KeyId,
        passphrase: &Passphrase,
    ) -> Result<PrivateKeyBundle> {
        let sealed: SealedPrivateKey = {
            let store = self.lock()?;
            match store.get(&sealed_key_key(key_id))? {
                Some(bytes) => deserialize(&bytes)?,
                None => {
                    return Err(QpgError::key_not_found(format!(
                        "No private key with ID {}",
                        key_id
                    )))
                }
            }
        };

        let armored = sealed.unseal(passphrase)?;
        let armored = String::from_utf8(armored)
            .map_err(|_| QpgError::key("Unsealed private key is not valid UTF-8"))?;
        PrivateKeyBundle::from_armored(&armored)
    }

    /// Deletes a key pair's records. Deleting an unknown ID is a no-op.
    pub fn delete(&self, key_id: KeyId) -> Result<()> {
        let store = self.lock()?;
        store.remove(&public_key_key(key_id))?;
        store.remove(&sealed_key_key(key_id))?;

        let mut index = read_index(store.as_ref())?;
        let before = index.len();
        index.retain(|id| *id != key_id);
        if index.len() != before {
            store.set(INDEX_KEY, &serialize(&index)?)?;
            info!(key_id = %key_id, "Deleted key pair");
        }
        Ok(())
    }

    /// Removes every record from the store.
    pub fn clear(&self) -> Result<()> {
        let store = self.lock()?;
        for key in store.keys()? {
            store.remove(&key)?;
        }
        info!("Cleared key store");
        Ok(())
    }

    /// Current usage statistics.
    pub fn stats(&self) -> Result<StorageStats> {
        let store = self.lock()?;
        let index = read_index(store.as_ref())?;
        Ok(StorageStats {
            key_count: index.len(),
            bytes_used: store.bytes_used()?,
            degraded: self.degraded,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn KeyValueStore>>> {
        self.store
            .lock()
            .map_err(|_| QpgError::storage("Key store lock poisoned"))
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("degraded", &self.degraded)
            .finish()
    }
}

fn public_key_key(key_id: KeyId) -> Vec<u8> {
    format!("pub:{}", key_id).into_bytes()
}

fn sealed_key_key(key_id: KeyId) -> Vec<u8> {
    format!("sealed:{}", key_id).into_bytes()
}

fn read_index(store: &dyn KeyValueStore) -> Result<Vec<KeyId>> {
    match store.get(INDEX_KEY)? {
        Some(bytes) => deserialize(&bytes),
        None => Ok(Vec::new()),
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| QpgError::serialization(format!("Failed to serialize record: {}", e)))
}

fn deserialize<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| QpgError::serialization(format!("Failed to deserialize record: {}", e)))
}
