//! # Outbound Ports
//!
//! The message transport and the dialer are implemented by the networking
//! layer; the scorer is implemented by [`crate::ServerPool`] and consumed by
//! request routing.

use async_trait::async_trait;
use lantern_types::{NodeId, RequestId, RequestKind};

use crate::domain::{DialError, DisconnectReason, Outcome, PeerCandidate, PeerInfo, TransportError};

/// Message-level transport to connected peers.
///
/// Replies do not come back through this trait; the networking layer hands
/// them to the retrieval manager tagged with the request id.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Send a request to `peer`.
    async fn send(
        &self,
        peer: &NodeId,
        request_id: RequestId,
        kind: &RequestKind,
    ) -> Result<(), TransportError>;

    /// Close the connection to `peer`.
    fn disconnect(&self, peer: &NodeId, reason: DisconnectReason);
}

/// Establishes outbound connections and performs the handshake.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Connect to a candidate, returning what it advertised.
    async fn dial(&self, candidate: &PeerCandidate) -> Result<PeerInfo, DialError>;
}

/// Reputation view used to rank peers for request routing.
pub trait PeerScorer: Send + Sync {
    /// Current score (zero for unknown peers).
    fn score(&self, peer: &NodeId) -> f64;

    /// Record the outcome of an interaction.
    fn record(&self, peer: &NodeId, outcome: Outcome);
}
