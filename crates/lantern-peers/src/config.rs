//! # Peer Configuration
//!
//! Settings for the peer registry, the reputation table and the server pool.
//! Every section deserialises with defaults so partial TOML works.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Peer registry settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSetConfig {
    /// Per-peer concurrency ceiling on outstanding requests.
    pub max_outstanding: usize,
    /// Lowest protocol version a serving peer may advertise.
    pub min_protocol_version: u32,
}

impl Default for PeerSetConfig {
    fn default() -> Self {
        Self {
            max_outstanding: 8,
            min_protocol_version: 2,
        }
    }
}

/// Reputation weights and thresholds.
///
/// Every update first multiplies the running score by `decay`, then adds the
/// outcome's delta, then clamps to `[-max_score, max_score]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    /// Added on a validated response.
    pub success_reward: f64,
    /// Subtracted when a request times out.
    pub timeout_penalty: f64,
    /// Subtracted when a response fails validation.
    pub invalid_penalty: f64,
    /// Subtracted for an unsolicited or mismatched reply.
    pub unsolicited_penalty: f64,
    /// Dial priority lost per consecutive dial failure (not part of the score).
    pub dial_failure_penalty: f64,
    /// Multiplicative decay applied on each update.
    pub decay: f64,
    /// Absolute bound on the score.
    pub max_score: f64,
    /// Below this score a peer is dialed and selected last.
    pub demote_threshold: f64,
    /// Below this score a peer is removed from the candidate set.
    pub drop_threshold: f64,
    /// Consecutive timeouts after which a peer is dropped.
    pub max_timeouts_in_row: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            success_reward: 1.0,
            timeout_penalty: 2.0,
            invalid_penalty: 10.0,
            unsolicited_penalty: 0.5,
            dial_failure_penalty: 1.0,
            decay: 0.98,
            max_score: 100.0,
            demote_threshold: -5.0,
            drop_threshold: -25.0,
            max_timeouts_in_row: 8,
        }
    }
}

impl ReputationConfig {
    /// Sharper thresholds so tests reach demotion quickly.
    pub fn for_testing() -> Self {
        Self {
            decay: 1.0,
            demote_threshold: -2.0,
            drop_threshold: -10.0,
            max_timeouts_in_row: 3,
            ..Self::default()
        }
    }
}

/// Server pool settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerPoolConfig {
    /// Number of connected peers the pool tries to maintain.
    pub target_connections: usize,
    /// Pause between dial rounds.
    pub dial_interval_ms: u64,
    /// First backoff after a failed dial.
    pub backoff_base_ms: u64,
    /// Upper bound on the backoff.
    pub backoff_max_ms: u64,
    /// Candidate set capacity.
    pub max_candidates: usize,
    /// Seed candidates as `hexid@address`.
    pub bootnodes: Vec<String>,
}

impl Default for ServerPoolConfig {
    fn default() -> Self {
        Self {
            target_connections: 5,
            dial_interval_ms: 1_000,
            backoff_base_ms: 1_000,
            backoff_max_ms: 5 * 60 * 1_000,
            max_candidates: 200,
            bootnodes: Vec::new(),
        }
    }
}

impl ServerPoolConfig {
    /// Create a config for testing (fast dial loop, short backoff).
    pub fn for_testing() -> Self {
        Self {
            target_connections: 3,
            dial_interval_ms: 10,
            backoff_base_ms: 100,
            backoff_max_ms: 1_000,
            max_candidates: 16,
            bootnodes: Vec::new(),
        }
    }

    /// Pause between dial rounds.
    pub fn dial_interval(&self) -> Duration {
        Duration::from_millis(self.dial_interval_ms)
    }

    /// Backoff after `failures` consecutive dial failures, before jitter.
    pub fn backoff(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let shift = (failures - 1).min(32);
        let delay = self.backoff_base_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.backoff_max_ms))
    }
}
