//! # Consensus Errors

use lantern_types::Hash;
use thiserror::Error;

/// A single consensus rule a header broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("extra-data too long: {len} > {max}")]
    ExtraDataTooLong { len: usize, max: usize },

    #[error("block in the future: timestamp {time} > limit {limit}")]
    FutureBlock { time: u64, limit: u64 },

    #[error("timestamp {time} not after parent's {parent_time}")]
    TimestampNotIncreasing { time: u64, parent_time: u64 },

    #[error("invalid gas limit: have {gas_limit}, max {max}")]
    GasLimitTooHigh { gas_limit: u64, max: u64 },

    #[error("invalid gas used: have {gas_used}, gas limit {gas_limit}")]
    GasUsedExceedsLimit { gas_used: u64, gas_limit: u64 },

    #[error("invalid gas limit: have {gas_limit}, want {parent_gas_limit} +- {bound}")]
    GasLimitDelta {
        gas_limit: u64,
        parent_gas_limit: u64,
        bound: u64,
    },

    #[error("gas limit {gas_limit} below minimum {min}")]
    GasLimitBelowMinimum { gas_limit: u64, min: u64 },

    #[error("invalid block number: have {number}, want {expected}")]
    InvalidNumber { number: u64, expected: u64 },
}

/// Header verification failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// The claimed parent is not known.
    #[error("unknown ancestor {} of block {number}", hex::encode(parent_hash))]
    UnknownAncestor { number: u64, parent_hash: Hash },

    /// A rule check failed.
    #[error("header rule violation: {0}")]
    HeaderRuleViolation(#[from] RuleViolation),

    /// The seal does not verify.
    #[error("invalid seal on block {number}: {reason}")]
    SealInvalid { number: u64, reason: String },

    /// Verification was abandoned by a stop signal.
    #[error("verification cancelled")]
    Cancelled,
}
