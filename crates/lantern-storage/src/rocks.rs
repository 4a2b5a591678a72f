//! # RocksDB Storage Adapter
//!
//! Persistent [`KeyValueStore`] backed by RocksDB.
//!
//! Reputation records and indexer section metadata are small and written
//! rarely, so the tuning favours durability over throughput.

use std::path::PathBuf;

use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};
use tracing::info;

use crate::error::StorageError;
use crate::kv::{BatchOperation, KeyValueStore};

/// RocksDB configuration.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory.
    pub path: PathBuf,
    /// Block cache size in bytes (default: 16MB).
    pub block_cache_size: usize,
    /// Write buffer size in bytes (default: 8MB).
    pub write_buffer_size: usize,
    /// fsync after each write (default: true).
    pub sync_writes: bool,
}

impl RocksDbConfig {
    /// Production defaults at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 16 * 1024 * 1024,
            write_buffer_size: 8 * 1024 * 1024,
            sync_writes: true,
        }
    }

    /// Create config for testing (small buffers, no sync).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 1024 * 1024,
            write_buffer_size: 1024 * 1024,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
}

fn io_error(op: &str, e: rocksdb::Error) -> StorageError {
    StorageError::Io {
        message: format!("RocksDB {op} failed: {e}"),
    }
}

impl RocksDbStore {
    /// Open or create a database.
    pub fn open(config: RocksDbConfig) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| io_error("open", e))?;
        info!(path = %config.path.display(), "Opened RocksDB store");
        Ok(Self { db, config })
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

impl KeyValueStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        self.db.get(key).map_err(|e| io_error("get", e))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
        self.db
            .put_opt(key, value, &self.write_options())
            .map_err(|e| io_error("put", e))
    }

    fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.db
            .delete_opt(key, &self.write_options())
            .map_err(|e| io_error("delete", e))
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => batch.put(&key, &value),
                BatchOperation::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_options())
            .map_err(|e| io_error("batch write", e))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        let mut results = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, rocksdb::Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| io_error("scan", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush().map_err(|e| io_error("flush", e))
    }
}
