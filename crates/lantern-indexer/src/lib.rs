//! # Lantern Indexer
//!
//! Checkpoint sections that let peer answers be proven against one trusted
//! root instead of a history scan.
//!
//! | Indexer | Leaves per section | Proves |
//! |---------|--------------------|--------|
//! | [`ChtIndexer`] | previous root, then `keccak(number, hash)` per block | a hash is canonical block N |
//! | [`BloomTrieIndexer`] | previous root, then one packed bit vector per bloom bit | which blocks may contain a log |
//!
//! Sealed sections are persisted as [`SectionMeta`] under a per-indexer
//! prefix and reloaded on restart.

pub mod backend;
pub mod config;
pub mod domain;
pub mod indexer;
pub mod metrics;

pub use backend::{BloomTrieBackend, ChtBackend, IndexerBackend};
pub use config::IndexerConfig;
pub use domain::{IndexerError, SectionMeta};
pub use indexer::{BloomTrieIndexer, ChainIndexer, ChtIndexer};
