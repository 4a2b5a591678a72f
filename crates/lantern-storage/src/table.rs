//! Typed bincode view over one key prefix of a [`KeyValueStore`].

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageError;
use crate::kv::{BatchOperation, KeyValueStore};

/// Values of type `V` stored under `prefix || key`.
pub struct Table<V> {
    store: Arc<dyn KeyValueStore>,
    prefix: &'static [u8],
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for Table<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prefix: self.prefix,
            _marker: PhantomData,
        }
    }
}

impl<V: Serialize + DeserializeOwned> Table<V> {
    /// Create a table over `store` under `prefix`.
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: &'static [u8]) -> Self {
        Self {
            store,
            prefix,
            _marker: PhantomData,
        }
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(self.prefix);
        full.extend_from_slice(key);
        full
    }

    fn encode(value: &V) -> Result<Vec<u8>, StorageError> {
        bincode::serialize(value).map_err(|e| StorageError::Encoding {
            message: e.to_string(),
        })
    }

    fn decode(bytes: &[u8]) -> Result<V, StorageError> {
        bincode::deserialize(bytes).map_err(|e| StorageError::Corruption {
            message: e.to_string(),
        })
    }

    /// Read one value.
    pub fn get(&self, key: &[u8]) -> Result<Option<V>, StorageError> {
        self.store
            .get(&self.full_key(key))?
            .map(|bytes| Self::decode(&bytes))
            .transpose()
    }

    /// Write one value.
    pub fn put(&self, key: &[u8], value: &V) -> Result<(), StorageError> {
        self.store.put(&self.full_key(key), &Self::encode(value)?)
    }

    /// Remove one value.
    pub fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
        self.store.delete(&self.full_key(key))
    }

    /// Write several values atomically.
    pub fn put_many<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a [u8], &'a V)>,
    ) -> Result<(), StorageError>
    where
        V: 'a,
    {
        let ops = entries
            .into_iter()
            .map(|(key, value)| Ok(BatchOperation::put(self.full_key(key), Self::encode(value)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;
        self.store.atomic_batch_write(ops)
    }

    /// Every entry, keys returned without the prefix.
    pub fn scan(&self) -> Result<Vec<(Vec<u8>, V)>, StorageError> {
        self.store
            .prefix_scan(self.prefix)?
            .into_iter()
            .map(|(key, bytes)| Ok((key[self.prefix.len()..].to_vec(), Self::decode(&bytes)?)))
            .collect()
    }
}
