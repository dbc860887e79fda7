//! RocksDB backend for the key store.

use rocksdb::{ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options};
use std::path::Path;
use std::sync::Arc;
use tracing::trace;

use crate::error::{QpgError, Result};
use crate::storage::KeyValueStore;

/// The single column family holding key store records.
const CF_KEYS: &str = "keys";

/// Configuration for the RocksDB backend.
///
/// The defaults are tuned for a small local key database, not a server
/// workload.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum WAL size in bytes.
    pub max_wal_size: u64,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 64,
            keep_log_file_num: 2,
            max_wal_size: 16 * 1024 * 1024,      // 16MB
            write_buffer_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl RocksDbConfig {
    /// Builds RocksDB Options from this configuration.
    pub fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

/// Persistent key-value store backed by RocksDB.
pub struct RocksDbStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbStore {
    /// Opens (or creates) the database at the given path.
    pub fn open(db_path: impl AsRef<Path>, config: &RocksDbConfig) -> Result<Self> {
        let opts = config.build_options();
        let cf_descriptors = vec![ColumnFamilyDescriptor::new(CF_KEYS, Options::default())];

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            cf_descriptors,
        )
        .map_err(|e| {
            QpgError::StorageUnavailable(format!("Failed to open RocksDB: {}", e))
        })?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(CF_KEYS)
            .ok_or_else(|| QpgError::storage(format!("Column family '{}' not found", CF_KEYS)))
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf()?;
        match self.db.get_cf(&cf, key) {
            Ok(Some(bytes)) => {
                trace!(key_len = key.len(), value_bytes = bytes.len(), "db_get: found record");
                Ok(Some(bytes.to_vec()))
            }
            Ok(None) => {
                trace!(key_len = key.len(), "db_get: key not found");
                Ok(None)
            }
            Err(e) => Err(QpgError::storage(format!("Failed to read: {}", e))),
        }
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf()?;
        trace!(key_len = key.len(), value_bytes = value.len(), "db_set: storing record");
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| QpgError::storage(format!("Failed to write: {}", e)))
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        let cf = self.cf()?;
        trace!(key_len = key.len(), "db_remove: deleting key");
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| QpgError::storage(format!("Failed to delete: {}", e)))
    }

    fn keys(&self) -> Result<Vec<Vec<u8>>> {
        let cf = self.cf()?;
        let mut keys = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (key, _) =
                item.map_err(|e| QpgError::storage(format!("Iterator error: {}", e)))?;
            keys.push(key.to_vec());
        }
        Ok(keys)
    }

    fn bytes_used(&self) -> Result<u64> {
        let cf = self.cf()?;
        let mut total: u64 = 0;
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (key, value) =
                item.map_err(|e| QpgError::storage(format!("Iterator error: {}", e)))?;
            total += (key.len() + value.len()) as u64;
        }
        Ok(total)
    }
}

impl std::fmt::Debug for RocksDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbStore").field("db", &"RocksDB").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_db() -> (RocksDbStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_db");
        let store =
            RocksDbStore::open(&db_path, &RocksDbConfig::default()).expect("Failed to open db");
        (store, temp_dir)
    }

    #[test]
    fn test_set_and_get() {
        let (store, _temp) = create_test_db();

        store.set(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap().unwrap(), b"value1");
        assert!(store.get(b"missing").unwrap().is_none());
    }

    #[test]
    fn test_remove() {
        let (store, _temp) = create_test_db();

        store.set(b"key", b"value").unwrap();
        store.remove(b"key").unwrap();
        assert!(store.get(b"key").unwrap().is_none());

        // Removing again is not an error.
        store.remove(b"key").unwrap();
    }

    #[test]
    fn test_keys_and_bytes_used() {
        let (store, _temp) = create_test_db();

        store.set(b"a", b"1").unwrap();
        store.set(b"b", b"22").unwrap();

        let keys = store.keys().unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(store.bytes_used().unwrap(), 5);
    }

    #[test]
    fn test_open_failure_is_storage_unavailable() {
        // A regular file, so RocksDB cannot open it as a database.
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = RocksDbStore::open(file.path(), &RocksDbConfig::default()).unwrap_err();
        assert!(matches!(err, QpgError::StorageUnavailable(_)));
    }

    #[test]
    fn test_values_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test_db");

        {
            let store = RocksDbStore::open(&db_path, &RocksDbConfig::default()).unwrap();
            store.set(b"persisted", b"value").unwrap();
        }

        let store = RocksDbStore::open(&db_path, &RocksDbConfig::default()).unwrap();
        assert_eq!(store.get(b"persisted").unwrap().unwrap(), b"value");
    }
}
