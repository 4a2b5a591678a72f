//! # Domain Errors

use lantern_types::NodeId;
use thiserror::Error;

/// Peer registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerSetError {
    /// The identity is already registered.
    #[error("peer {0} already registered")]
    AlreadyRegistered(NodeId),

    /// The identity is not registered.
    #[error("peer {0} not registered")]
    NotFound(NodeId),

    /// The peer speaks a protocol version below the configured minimum.
    #[error("peer {peer} protocol version {version} below minimum {minimum}")]
    ProtocolTooOld {
        /// Offending peer.
        peer: NodeId,
        /// Advertised version.
        version: u32,
        /// Required version.
        minimum: u32,
    },
}

/// Outbound connection failures reported by a [`crate::Dialer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DialError {
    /// The remote was unreachable.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The handshake failed or the remote is not a usable server.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The remote answered with a different identity.
    #[error("identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch {
        /// Identity we dialed.
        expected: NodeId,
        /// Identity that answered.
        actual: NodeId,
    },
}

/// Failures sending to a connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer is no longer connected.
    #[error("peer {0} disconnected")]
    Disconnected(NodeId),

    /// The send queue rejected the message.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Server pool failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// A bootnode entry is not `hexid@address`.
    #[error("invalid bootnode {entry:?}: {reason}")]
    InvalidBootnode {
        /// Raw entry.
        entry: String,
        /// What was wrong.
        reason: String,
    },

    /// Reputation persistence failed.
    #[error("reputation storage: {0}")]
    Storage(#[from] lantern_storage::StorageError),
}
