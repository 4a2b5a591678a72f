//! # Lantern Storage
//!
//! Persistence port shared by the reputation table and the chain indexers.
//!
//! ## Layout
//!
//! - [`KeyValueStore`]: byte-level port, implemented by [`MemoryStore`] and
//!   (feature `rocksdb`) [`RocksDbStore`].
//! - [`Table`]: typed bincode view over one key prefix.
//!
//! Writes to a given table come from a single owner; the store itself only
//! guarantees that each batch is applied atomically.

pub mod error;
pub mod kv;
pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocks;
pub mod table;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::StorageError;
pub use kv::{BatchOperation, KeyValueStore};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb")]
pub use rocks::{RocksDbConfig, RocksDbStore};
pub use table::Table;

/// Which backend to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Volatile, process-local.
    Memory,
    /// RocksDB database under the given directory.
    RocksDb(PathBuf),
}

/// Open the configured backend as a shared store.
pub fn open_store(backend: &StorageBackend) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    match backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb(path) => {
            let store = RocksDbStore::open(RocksDbConfig::new(path.clone()))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb(_) => Err(StorageError::Unsupported(
            "built without the rocksdb feature".to_string(),
        )),
    }
}
