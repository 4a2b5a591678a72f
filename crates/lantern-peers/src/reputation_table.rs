//! # Reputation Table
//!
//! Owned map of [`ReputationRecord`]s, persisted through a [`Table`].
//!
//! All mutation goes through [`ReputationTable::record`] and friends. Writers
//! are serialised by a separate mutex held across the in-memory update and
//! the store write, so records reach the store in update order. The map lock
//! is held only for the update itself; readers get copies and never wait on
//! the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use lantern_storage::{KeyValueStore, StorageError, Table};
use lantern_types::NodeId;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::ReputationConfig;
use crate::domain::{Outcome, ReputationRecord, Standing};

/// Key prefix of reputation records.
pub const REPUTATION_PREFIX: &[u8] = b"lantern/reputation/";

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Persisted per-peer reputation.
pub struct ReputationTable {
    config: ReputationConfig,
    records: RwLock<HashMap<NodeId, ReputationRecord>>,
    writer: Mutex<()>,
    table: Option<Table<ReputationRecord>>,
}

impl ReputationTable {
    /// A table that is never persisted.
    pub fn in_memory(config: ReputationConfig) -> Self {
        Self {
            config,
            records: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
            table: None,
        }
    }

    /// Load every stored record from `store`.
    pub fn load(
        store: Arc<dyn KeyValueStore>,
        config: ReputationConfig,
    ) -> Result<Self, StorageError> {
        let table: Table<ReputationRecord> = Table::new(store, REPUTATION_PREFIX);
        let mut records = HashMap::new();
        for (key, record) in table.scan()? {
            let Ok(bytes) = <[u8; 32]>::try_from(key.as_slice()) else {
                warn!(key_len = key.len(), "Skipping malformed reputation key");
                continue;
            };
            records.insert(NodeId::new(bytes), record);
        }
        debug!(records = records.len(), "Loaded reputation table");
        Ok(Self {
            config,
            records: RwLock::new(records),
            writer: Mutex::new(()),
            table: Some(table),
        })
    }

    /// Weights and thresholds.
    pub fn config(&self) -> &ReputationConfig {
        &self.config
    }

    fn persist(&self, id: &NodeId, record: &ReputationRecord) {
        if let Some(table) = &self.table {
            if let Err(e) = table.put(id.as_bytes(), record) {
                warn!(peer = %id, error = %e, "Failed to persist reputation record");
            }
        }
    }

    /// Ensure a record exists for `id`, updating its address.
    pub fn remember(&self, id: &NodeId, address: &str) {
        let _writer = self.writer.lock();
        let record = {
            let mut records = self.records.write();
            let record = records
                .entry(*id)
                .or_insert_with(|| ReputationRecord::new(address, unix_now()));
            if record.address != address {
                record.address = address.to_string();
            }
            record.clone()
        };
        self.persist(id, &record);
    }

    /// Fold `outcome` into the record for `id` and return the updated record.
    pub fn record(&self, id: &NodeId, outcome: Outcome) -> ReputationRecord {
        let _writer = self.writer.lock();
        let now = unix_now();
        let record = {
            let mut records = self.records.write();
            let record = records
                .entry(*id)
                .or_insert_with(|| ReputationRecord::new(String::new(), now));
            record.apply(outcome, &self.config, now);
            record.clone()
        };
        self.persist(id, &record);
        record
    }

    /// Copy of the record for `id`.
    pub fn get(&self, id: &NodeId) -> Option<ReputationRecord> {
        self.records.read().get(id).cloned()
    }

    /// Current score, zero for unknown peers.
    pub fn score(&self, id: &NodeId) -> f64 {
        self.records.read().get(id).map_or(0.0, |r| r.score)
    }

    /// Standing of `id`; unknown peers are in good standing.
    pub fn standing(&self, id: &NodeId) -> Standing {
        self.records
            .read()
            .get(id)
            .map_or(Standing::Good, |r| r.standing(&self.config))
    }

    /// Copy of every record.
    pub fn snapshot(&self) -> Vec<(NodeId, ReputationRecord)> {
        self.records
            .read()
            .iter()
            .map(|(id, r)| (*id, r.clone()))
            .collect()
    }

    /// Number of known peers.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no peer is known.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Write every record to the store in one batch.
    pub fn flush(&self) -> Result<(), StorageError> {
        let Some(table) = &self.table else {
            return Ok(());
        };
        let _writer = self.writer.lock();
        let records = self.snapshot();
        let keyed: Vec<(&[u8], &ReputationRecord)> = records
            .iter()
            .map(|(id, record)| (id.as_bytes().as_slice(), record))
            .collect();
        table.put_many(keyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lantern_storage::{BatchOperation, MemoryStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn id(byte: u8) -> NodeId {
        NodeId::new([byte; 32])
    }

    #[test]
    fn test_records_survive_reload() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let config = ReputationConfig::for_testing();
        {
            let table = ReputationTable::load(Arc::clone(&store), config.clone()).unwrap();
            table.remember(&id(1), "10.0.0.1:30303");
            table.record(&id(1), Outcome::Success);
            table.record(&id(2), Outcome::InvalidResponse);
        }

        let table = ReputationTable::load(store, config).unwrap();
        assert_eq!(table.len(), 2);
        let good = table.get(&id(1)).unwrap();
        assert_eq!(good.successes, 1);
        assert_eq!(good.address, "10.0.0.1:30303");
        assert!(table.score(&id(2)) < 0.0);
    }

    #[test]
    fn test_unknown_peer_defaults() {
        let table = ReputationTable::in_memory(ReputationConfig::default());
        assert_eq!(table.score(&id(7)), 0.0);
        assert_eq!(table.standing(&id(7)), Standing::Good);
        assert!(table.flush().is_ok());
    }

    #[test]
    fn test_standing_follows_record() {
        let table = ReputationTable::in_memory(ReputationConfig::for_testing());
        table.record(&id(3), Outcome::InvalidResponse);
        assert_eq!(table.standing(&id(3)), Standing::Demoted);
        table.record(&id(3), Outcome::InvalidResponse);
        assert_eq!(table.standing(&id(3)), Standing::Dropped);
    }

    #[test]
    fn test_flush_writes_all_records() {
        let store = Arc::new(MemoryStore::new());
        let table =
            ReputationTable::load(store.clone(), ReputationConfig::default()).unwrap();
        table.record(&id(1), Outcome::Timeout);
        table.flush().unwrap();
        assert_eq!(store.prefix_scan(REPUTATION_PREFIX).unwrap().len(), 1);
    }

    /// Memory store whose writes wait while the gate is held.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryStore,
        gate: Mutex<()>,
        entered: AtomicBool,
    }

    impl KeyValueStore for GatedStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
            self.entered.store(true, Ordering::SeqCst);
            let _gate = self.gate.lock();
            self.inner.put(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<(), StorageError> {
            self.inner.delete(key)
        }

        fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), StorageError> {
            self.entered.store(true, Ordering::SeqCst);
            let _gate = self.gate.lock();
            self.inner.atomic_batch_write(operations)
        }

        fn prefix_scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
            self.inner.prefix_scan(prefix)
        }
    }

    #[test]
    fn test_readers_not_blocked_by_slow_store_write() {
        let store = Arc::new(GatedStore::default());
        let table = Arc::new(
            ReputationTable::load(store.clone(), ReputationConfig::for_testing()).unwrap(),
        );

        let gate = store.gate.lock();
        let writer = {
            let table = Arc::clone(&table);
            thread::spawn(move || table.record(&id(1), Outcome::Success))
        };
        while !store.entered.load(Ordering::SeqCst) {
            thread::yield_now();
        }

        // The store write is parked; the update is already visible
        assert_eq!(table.get(&id(1)).unwrap().successes, 1);
        assert_eq!(table.standing(&id(1)), Standing::Good);
        assert_eq!(table.len(), 1);

        drop(gate);
        let recorded = writer.join().unwrap();
        let reloaded = ReputationTable::load(store, ReputationConfig::for_testing()).unwrap();
        assert_eq!(reloaded.get(&id(1)), Some(recorded));
    }

    #[test]
    fn test_concurrent_records_persist_latest_value() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let table = Arc::new(
            ReputationTable::load(Arc::clone(&store), ReputationConfig::default()).unwrap(),
        );

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for _ in 0..25 {
                        table.record(&id(9), Outcome::Success);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let reloaded = ReputationTable::load(store, ReputationConfig::default()).unwrap();
        assert_eq!(reloaded.get(&id(9)), table.get(&id(9)));
        assert_eq!(reloaded.get(&id(9)).unwrap().successes, 100);
    }
}
