//! # Retrieval Errors
//!
//! Per-attempt failures ([`RetrievalError::Timeout`],
//! [`RetrievalError::InvalidResponse`], [`RetrievalError::PeerDisconnected`],
//! [`RetrievalError::SendFailed`]) are retried by the manager and only reach
//! the caller wrapped in [`RetrievalError::RetrievalFailed`]. Everything else
//! is terminal.

use lantern_consensus::ConsensusError;
use lantern_types::{Hash, NodeId};
use thiserror::Error;

fn short(hash: &Hash) -> String {
    hex::encode(&hash[..4])
}

/// Why a reply failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The reply is a different kind of message.
    #[error("expected {expected} reply, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },

    /// Wrong number of items.
    #[error("expected {expected} items, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    /// A hash does not match the requested one.
    #[error("hash mismatch: expected {}.., got {}..", short(expected), short(actual))]
    HashMismatch { expected: Hash, actual: Hash },

    /// Content does not reproduce the committed root.
    #[error("root mismatch: expected {}.., got {}..", short(expected), short(actual))]
    RootMismatch { expected: Hash, actual: Hash },

    /// A header has the wrong number.
    #[error("number mismatch: expected {expected}, got {actual}")]
    NumberMismatch { expected: u64, actual: u64 },

    /// A Merkle proof does not verify.
    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The payload cannot be decoded.
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// The header breaks a consensus rule.
    #[error("consensus violation: {0}")]
    Consensus(#[from] ConsensusError),
}

/// Failures of [`crate::RequestDistributor::distribute`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    /// No peer became eligible within the wait.
    #[error("no eligible peer")]
    NoEligiblePeer,

    /// Shutdown fired while parked.
    #[error("distribution cancelled")]
    Cancelled,
}

/// Outcome of a failed retrieval or retrieval attempt.
///
/// `Clone` so one coalesced result can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// No peer could be assigned.
    #[error("{request}: no eligible peer")]
    NoEligiblePeer { request: String },

    /// The assigned peer did not reply before the deadline.
    #[error("{request}: peer {peer} timed out after {after_ms}ms")]
    Timeout {
        request: String,
        peer: NodeId,
        after_ms: u64,
    },

    /// The reply failed validation.
    #[error("{request}: invalid response from {peer}: {reason}")]
    InvalidResponse {
        request: String,
        peer: NodeId,
        reason: ValidationError,
    },

    /// The assigned peer left while the attempt was in flight.
    #[error("{request}: peer {peer} disconnected")]
    PeerDisconnected { request: String, peer: NodeId },

    /// The transport refused the request.
    #[error("{request}: send to {peer} failed: {reason}")]
    SendFailed {
        request: String,
        peer: NodeId,
        reason: String,
    },

    /// Retry budget exhausted.
    #[error("{request}: retrieval failed after {attempts} attempts: {last_error}")]
    RetrievalFailed {
        request: String,
        attempts: u32,
        last_peer: Option<NodeId>,
        last_error: Box<RetrievalError>,
    },

    /// A peer served a header that breaks the chain rules. Never retried.
    #[error("{request}: header from {peer} rejected: {error}")]
    HeaderRejected {
        request: String,
        peer: NodeId,
        error: ConsensusError,
    },

    /// No sealed checkpoint covers the request.
    #[error("{request}: no sealed checkpoint for section {section}")]
    MissingCheckpoint { request: String, section: u64 },

    /// The validated reply had an unexpected shape.
    #[error("{request}: unexpected {got} reply")]
    UnexpectedResponse { request: String, got: &'static str },

    /// Shutdown fired.
    #[error("{request}: cancelled")]
    Cancelled { request: String },
}

impl RetrievalError {
    /// Whether the retry loop may try another peer after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RetrievalError::Timeout { .. }
                | RetrievalError::InvalidResponse { .. }
                | RetrievalError::PeerDisconnected { .. }
                | RetrievalError::SendFailed { .. }
        )
    }

    /// The peer the error is about, if any.
    pub fn peer(&self) -> Option<NodeId> {
        match self {
            RetrievalError::Timeout { peer, .. }
            | RetrievalError::InvalidResponse { peer, .. }
            | RetrievalError::PeerDisconnected { peer, .. }
            | RetrievalError::SendFailed { peer, .. }
            | RetrievalError::HeaderRejected { peer, .. } => Some(*peer),
            RetrievalError::RetrievalFailed { last_peer, .. } => *last_peer,
            _ => None,
        }
    }
}
