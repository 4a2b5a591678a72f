//! # Reputation Rules
//!
//! Per-peer history used to rank dialing and selection order.
//!
//! | Outcome | Score | Counters |
//! |---------|-------|----------|
//! | Success | `+success_reward` | resets timeouts-in-row |
//! | Timeout | `-timeout_penalty` | timeouts-in-row + 1 |
//! | InvalidResponse | `-invalid_penalty` | failure count + 1 |
//! | Unsolicited | `-unsolicited_penalty` | |
//! | DialFailure | unchanged | dial failures + 1 (priority only) |
//! | Connected | unchanged | dial failures reset |
//!
//! Dial failures are treated as transient network conditions: they lower dial
//! priority and drive backoff but never push a peer toward being dropped.

use serde::{Deserialize, Serialize};

use crate::config::ReputationConfig;

/// A completed interaction with a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Response passed validation.
    Success,
    /// No reply before the deadline.
    Timeout,
    /// Reply failed validation.
    InvalidResponse,
    /// Reply nobody asked this peer for.
    Unsolicited,
    /// Outbound connection attempt failed.
    DialFailure,
    /// Outbound connection attempt succeeded.
    Connected,
}

/// Where a peer stands after its latest update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    /// Normal priority.
    Good,
    /// Dialed and selected last.
    Demoted,
    /// Removed from the candidate set.
    Dropped,
}

/// Persisted per-peer history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReputationRecord {
    /// Running score.
    pub score: f64,
    /// Unix seconds of the last update.
    pub last_seen: u64,
    /// Validation failures and timeouts since the record was created.
    pub failure_count: u32,
    /// Validated responses.
    pub successes: u64,
    /// Consecutive timeouts.
    pub timeouts_in_row: u32,
    /// Consecutive failed dials.
    pub dial_failures: u32,
    /// Last known dial address.
    pub address: String,
}

impl ReputationRecord {
    /// Fresh record for a peer at `address`.
    pub fn new(address: impl Into<String>, now: u64) -> Self {
        Self {
            address: address.into(),
            last_seen: now,
            ..Self::default()
        }
    }

    /// Fold one outcome into the record.
    pub fn apply(&mut self, outcome: Outcome, config: &ReputationConfig, now: u64) {
        let delta = match outcome {
            Outcome::Success => {
                self.successes += 1;
                self.timeouts_in_row = 0;
                config.success_reward
            }
            Outcome::Timeout => {
                self.failure_count += 1;
                self.timeouts_in_row += 1;
                -config.timeout_penalty
            }
            Outcome::InvalidResponse => {
                self.failure_count += 1;
                -config.invalid_penalty
            }
            Outcome::Unsolicited => -config.unsolicited_penalty,
            Outcome::DialFailure => {
                self.dial_failures += 1;
                self.last_seen = self.last_seen.max(now);
                return;
            }
            Outcome::Connected => {
                self.dial_failures = 0;
                self.last_seen = now;
                return;
            }
        };

        self.score = (self.score * config.decay + delta).clamp(-config.max_score, config.max_score);
        self.last_seen = now;
    }

    /// Classification under `config`.
    pub fn standing(&self, config: &ReputationConfig) -> Standing {
        if self.score < config.drop_threshold || self.timeouts_in_row >= config.max_timeouts_in_row
        {
            Standing::Dropped
        } else if self.score < config.demote_threshold {
            Standing::Demoted
        } else {
            Standing::Good
        }
    }

    /// Dial ordering key: the score minus the transient dial-failure penalty.
    pub fn dial_priority(&self, config: &ReputationConfig) -> f64 {
        self.score - config.dial_failure_penalty * f64::from(self.dial_failures)
    }
}
