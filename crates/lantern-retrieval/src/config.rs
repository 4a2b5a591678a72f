//! # Retrieval Configuration

use std::time::Duration;

use lantern_types::RequestClass;
use serde::{Deserialize, Serialize};

/// Attempts allowed per request class.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryBudgets {
    /// Headers by hash or number.
    pub header: u32,
    /// Block bodies.
    pub body: u32,
    /// Receipts.
    pub receipts: u32,
    /// Account and storage proofs.
    pub state: u32,
    /// CHT and BloomTrie proofs.
    pub checkpoint: u32,
    /// Latest head.
    pub latest: u32,
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            header: 4,
            body: 3,
            receipts: 3,
            state: 3,
            checkpoint: 4,
            latest: 2,
        }
    }
}

impl RetryBudgets {
    /// Budget for `class`.
    pub fn for_class(&self, class: RequestClass) -> u32 {
        match class {
            RequestClass::Header => self.header,
            RequestClass::Body => self.body,
            RequestClass::Receipts => self.receipts,
            RequestClass::State => self.state,
            RequestClass::Checkpoint => self.checkpoint,
            RequestClass::Latest => self.latest,
        }
    }

    /// Smallest budget of any class.
    pub fn min(&self) -> u32 {
        [
            self.header,
            self.body,
            self.receipts,
            self.state,
            self.checkpoint,
            self.latest,
        ]
        .into_iter()
        .min()
        .unwrap_or(0)
    }
}

/// Retrieval timing and routing weights.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Per-attempt reply deadline.
    pub request_timeout_ms: u64,
    /// How long a request may stay parked waiting for an eligible peer.
    pub distribution_wait_ms: u64,
    /// Weight of reputation against load in the routing cost.
    pub reputation_weight: f64,
    /// Verified headers kept by the typed retrieval facade.
    pub header_cache_size: usize,
    /// Attempts per request class.
    pub budgets: RetryBudgets,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 3000,
            distribution_wait_ms: 5000,
            reputation_weight: 0.01,
            header_cache_size: 1024,
            budgets: RetryBudgets::default(),
        }
    }
}

impl RetrievalConfig {
    /// Create a config for testing (short deadlines).
    pub fn for_testing() -> Self {
        Self {
            request_timeout_ms: 100,
            distribution_wait_ms: 50,
            header_cache_size: 16,
            ..Self::default()
        }
    }

    /// Per-attempt deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Maximum parking time.
    pub fn distribution_wait(&self) -> Duration {
        Duration::from_millis(self.distribution_wait_ms)
    }
}
