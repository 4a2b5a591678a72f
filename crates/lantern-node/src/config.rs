//! # Node Configuration
//!
//! One TOML document covering every component. Each section has defaults,
//! so a file only needs the values it changes.
//!
//! ```toml
//! [peers]
//! max_outstanding = 8
//!
//! [pool]
//! target_connections = 6
//! bootnodes = ["<64 hex chars>@10.0.0.1:30303"]
//!
//! [retrieval]
//! request_timeout_ms = 3000
//!
//! [retrieval.budgets]
//! header = 4
//!
//! [indexer]
//! section_size = 32768
//! confirmations = 2048
//!
//! [storage]
//! backend = "rocksdb"
//! data_dir = "./lantern-data"
//!
//! [logging]
//! level = "info"
//! json = false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use lantern_consensus::ConsensusConfig;
use lantern_indexer::IndexerConfig;
use lantern_peers::{parse_bootnode, PeerSetConfig, ReputationConfig, ServerPoolConfig};
use lantern_retrieval::RetrievalConfig;
use lantern_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    /// The document is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Which store backs reputation and section metadata.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Lost on restart.
    #[default]
    Memory,
    /// RocksDB under `data_dir`.
    Rocksdb,
}

/// Storage section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind.
    pub backend: StorageKind,
    /// Database directory for persistent backends.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::Memory,
            data_dir: PathBuf::from("./lantern-data"),
        }
    }
}

impl StorageConfig {
    /// The backend to open.
    pub fn backend(&self) -> StorageBackend {
        match self.backend {
            StorageKind::Memory => StorageBackend::Memory,
            StorageKind::Rocksdb => StorageBackend::RocksDb(self.data_dir.clone()),
        }
    }
}

/// Logging section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete node configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Peer registry.
    pub peers: PeerSetConfig,
    /// Server pool.
    pub pool: ServerPoolConfig,
    /// Reputation weights and thresholds.
    pub reputation: ReputationConfig,
    /// Retrieval timeouts and budgets.
    pub retrieval: RetrievalConfig,
    /// Checkpoint indexers.
    pub indexer: IndexerConfig,
    /// Header verification.
    pub consensus: ConsensusConfig,
    /// Persistent store.
    pub storage: StorageConfig,
    /// Tracing output.
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Settings small enough for tests: in-memory store, short timeouts.
    pub fn for_testing() -> Self {
        Self {
            peers: PeerSetConfig::default(),
            pool: ServerPoolConfig::for_testing(),
            reputation: ReputationConfig::for_testing(),
            retrieval: RetrievalConfig::for_testing(),
            indexer: IndexerConfig::for_testing(),
            consensus: ConsensusConfig::for_testing(),
            storage: StorageConfig::default(),
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.peers.max_outstanding == 0 {
            return Err(invalid("peers.max_outstanding", "must be at least 1"));
        }

        let pool = &self.pool;
        if pool.backoff_max_ms < pool.backoff_base_ms {
            return Err(invalid(
                "pool.backoff_max_ms",
                format!("{} is below backoff_base_ms {}", pool.backoff_max_ms, pool.backoff_base_ms),
            ));
        }
        if pool.max_candidates == 0 {
            return Err(invalid("pool.max_candidates", "must be at least 1"));
        }
        for entry in &pool.bootnodes {
            parse_bootnode(entry).map_err(|e| invalid("pool.bootnodes", e.to_string()))?;
        }

        let reputation = &self.reputation;
        if !(reputation.decay > 0.0 && reputation.decay <= 1.0) {
            return Err(invalid("reputation.decay", "must be in (0, 1]"));
        }
        if reputation.drop_threshold > reputation.demote_threshold {
            return Err(invalid(
                "reputation.drop_threshold",
                "must not exceed demote_threshold",
            ));
        }

        if self.retrieval.request_timeout_ms == 0 {
            return Err(invalid("retrieval.request_timeout_ms", "must be positive"));
        }
        if self.retrieval.budgets.min() == 0 {
            return Err(invalid("retrieval.budgets", "every budget must be at least 1"));
        }

        if self.indexer.section_size == 0 {
            return Err(invalid("indexer.section_size", "must be positive"));
        }
        if self.indexer.bloom_section_size == 0 {
            return Err(invalid("indexer.bloom_section_size", "must be positive"));
        }

        if self.consensus.gas_limit_bound_divisor == 0 {
            return Err(invalid("consensus.gas_limit_bound_divisor", "must be positive"));
        }
        Ok(())
    }
}
