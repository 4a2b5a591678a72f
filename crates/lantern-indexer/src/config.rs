//! # Indexer Configuration

use serde::{Deserialize, Serialize};

/// Section geometry and finality depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Blocks per CHT section.
    pub section_size: u64,
    /// Blocks per BloomTrie section.
    pub bloom_section_size: u64,
    /// Depth below the head at which a block is treated as final.
    pub confirmations: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            section_size: 32_768,
            bloom_section_size: 4096,
            confirmations: 2048,
        }
    }
}

impl IndexerConfig {
    /// Create a config for testing (tiny sections, shallow finality).
    pub fn for_testing() -> Self {
        Self {
            section_size: 8,
            bloom_section_size: 8,
            confirmations: 2,
        }
    }
}
