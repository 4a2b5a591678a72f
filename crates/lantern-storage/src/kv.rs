//! Byte-level key-value port.

use crate::error::StorageError;

/// Abstract key-value store.
///
/// Implementations are internally synchronised; all methods take `&self` so a
/// single store can be shared between subsystems behind an `Arc`.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), StorageError>;

    /// Apply every operation or none of them.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;

    /// Flush pending writes. A no-op for volatile stores.
    fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put { key: Vec<u8>, value: Vec<u8> },
    /// Delete a key.
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}
