//! # Consensus Configuration

use serde::{Deserialize, Serialize};

/// Chain rule parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Maximum extra-data length in bytes.
    pub max_extra_data: usize,
    /// Divisor bounding the gas-limit change from parent to child.
    pub gas_limit_bound_divisor: u64,
    /// Protocol floor for the gas limit.
    pub min_gas_limit: u64,
    /// How far ahead of local time a header timestamp may be.
    pub allowed_future_secs: u64,
    /// First block paying the reduced reward.
    pub reward_transition_block: u64,
    /// Reward before the transition, in base units.
    pub initial_reward: u64,
    /// Reward from the transition on, in base units.
    pub reduced_reward: u64,
}

/// Absolute gas-limit ceiling (2^63 - 1).
pub const MAX_GAS_LIMIT: u64 = 0x7fff_ffff_ffff_ffff;

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            max_extra_data: 32,
            gas_limit_bound_divisor: 1024,
            min_gas_limit: 5000,
            allowed_future_secs: 15,
            reward_transition_block: 4_370_000,
            initial_reward: 5_000_000_000_000_000_000,
            reduced_reward: 3_000_000_000_000_000_000,
        }
    }
}

impl ConsensusConfig {
    /// Create a config for testing (early reward transition).
    pub fn for_testing() -> Self {
        Self {
            reward_transition_block: 10,
            ..Self::default()
        }
    }
}
