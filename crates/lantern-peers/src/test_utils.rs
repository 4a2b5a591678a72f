//! Scripted collaborators for tests: a dialer with canned answers, a
//! transport that records what was sent, and a scorer that records outcomes.

use std::collections::HashMap;

use async_trait::async_trait;
use lantern_types::{NodeId, RequestId, RequestKind};
use parking_lot::Mutex;

use crate::domain::{
    DialError, DisconnectReason, Outcome, PeerCandidate, PeerInfo, TransportError,
};
use crate::ports::{Dialer, PeerScorer, PeerTransport};

/// Handshake info for the peer with id `[byte; 32]`.
pub fn peer_info(byte: u8, head: u64) -> PeerInfo {
    PeerInfo {
        id: NodeId::new([byte; 32]),
        address: format!("10.0.0.{byte}:30303"),
        head_number: head,
        head_hash: [byte; 32],
        capacity: 1,
        protocol_version: 2,
    }
}

/// Dialer answering from a script. Unscripted candidates are unreachable.
#[derive(Default)]
pub struct ScriptedDialer {
    responses: Mutex<HashMap<NodeId, Result<PeerInfo, DialError>>>,
    attempts: Mutex<Vec<NodeId>>,
}

impl ScriptedDialer {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the answer for `id`.
    pub fn respond(&self, id: NodeId, response: Result<PeerInfo, DialError>) {
        self.responses.lock().insert(id, response);
    }

    /// Accept dials to `info.id` with `info`.
    pub fn accept(&self, info: PeerInfo) {
        self.respond(info.id, Ok(info));
    }

    /// Every dialed id, in order.
    pub fn attempts(&self) -> Vec<NodeId> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, candidate: &PeerCandidate) -> Result<PeerInfo, DialError> {
        self.attempts.lock().push(candidate.id);
        self.responses
            .lock()
            .get(&candidate.id)
            .cloned()
            .unwrap_or_else(|| Err(DialError::Unreachable(candidate.address.clone())))
    }
}

/// Transport that records sends and disconnects and never replies.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(NodeId, RequestId, RequestKind)>>,
    disconnects: Mutex<Vec<(NodeId, DisconnectReason)>>,
}

impl RecordingTransport {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send, in order.
    pub fn sent(&self) -> Vec<(NodeId, RequestId, RequestKind)> {
        self.sent.lock().clone()
    }

    /// Every disconnect, in order.
    pub fn disconnects(&self) -> Vec<(NodeId, DisconnectReason)> {
        self.disconnects.lock().clone()
    }
}

#[async_trait]
impl PeerTransport for RecordingTransport {
    async fn send(
        &self,
        peer: &NodeId,
        request_id: RequestId,
        kind: &RequestKind,
    ) -> Result<(), TransportError> {
        self.sent.lock().push((*peer, request_id, kind.clone()));
        Ok(())
    }

    fn disconnect(&self, peer: &NodeId, reason: DisconnectReason) {
        self.disconnects.lock().push((*peer, reason));
    }
}

/// Scorer with fixed scores that records every outcome.
#[derive(Default)]
pub struct RecordingScorer {
    scores: Mutex<HashMap<NodeId, f64>>,
    outcomes: Mutex<Vec<(NodeId, Outcome)>>,
}

impl RecordingScorer {
    /// All peers at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the score reported for `id`.
    pub fn set_score(&self, id: NodeId, score: f64) {
        self.scores.lock().insert(id, score);
    }

    /// Every recorded outcome, in order.
    pub fn outcomes(&self) -> Vec<(NodeId, Outcome)> {
        self.outcomes.lock().clone()
    }
}

impl PeerScorer for RecordingScorer {
    fn score(&self, peer: &NodeId) -> f64 {
        self.scores.lock().get(peer).copied().unwrap_or(0.0)
    }

    fn record(&self, peer: &NodeId, outcome: Outcome) {
        self.outcomes.lock().push((*peer, outcome));
    }
}
