//! Simulated serving peers for tests. Enabled with the `test-utils` feature.
//!
//! [`SimNetwork`] implements [`PeerTransport`]: every send is recorded and
//! answered according to the receiving peer's [`Behavior`], by delivering
//! the reply back into the attached [`RetrieveManager`].

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use lantern_peers::{DisconnectReason, PeerTransport, TransportError};
use lantern_types::{BlockBody, NodeId, RequestId, RequestKind, Response};
use parking_lot::Mutex;

use crate::manager::RetrieveManager;

/// How a simulated peer treats requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Behavior {
    /// Answer from the shared responder.
    #[default]
    Honest,
    /// Never answer.
    Silent,
    /// Answer with garbage that fails every validator.
    Corrupt,
    /// Leave the peer set instead of answering.
    Disconnect,
}

/// Produces the honest answer for a request, if there is one.
pub type Responder = dyn Fn(&RequestKind) -> Option<Response> + Send + Sync;

/// In-process network of scripted peers.
pub struct SimNetwork {
    responder: Box<Responder>,
    manager: Mutex<Weak<RetrieveManager>>,
    behaviors: Mutex<HashMap<NodeId, Behavior>>,
    delays: Mutex<HashMap<NodeId, Duration>>,
    sent: Mutex<Vec<(NodeId, RequestId, RequestKind)>>,
    disconnects: Mutex<Vec<(NodeId, DisconnectReason)>>,
}

impl SimNetwork {
    /// Network answering honestly through `responder`. Nothing is served
    /// until a manager is attached.
    pub fn new(
        responder: impl Fn(&RequestKind) -> Option<Response> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            manager: Mutex::new(Weak::new()),
            behaviors: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            disconnects: Mutex::new(Vec::new()),
        })
    }

    /// Route replies into `manager` and serve the peers it knows.
    pub fn attach(&self, manager: &Arc<RetrieveManager>) {
        *self.manager.lock() = Arc::downgrade(manager);
    }

    /// Set how `peer` behaves.
    pub fn set_behavior(&self, peer: NodeId, behavior: Behavior) {
        self.behaviors.lock().insert(peer, behavior);
    }

    /// Delay `peer`'s replies.
    pub fn set_delay(&self, peer: NodeId, delay: Duration) {
        self.delays.lock().insert(peer, delay);
    }

    /// Every send, in order.
    pub fn sent(&self) -> Vec<(NodeId, RequestId, RequestKind)> {
        self.sent.lock().clone()
    }

    /// Sends addressed to `peer`.
    pub fn sends_to(&self, peer: &NodeId) -> usize {
        self.sent.lock().iter().filter(|(p, _, _)| p == peer).count()
    }

    /// Every disconnect requested by the node.
    pub fn disconnects(&self) -> Vec<(NodeId, DisconnectReason)> {
        self.disconnects.lock().clone()
    }

    /// Inject a reply as if `peer` had sent it.
    pub fn inject(&self, peer: &NodeId, request_id: RequestId, response: Response) {
        if let Some(manager) = self.manager.lock().upgrade() {
            manager.deliver(peer, request_id, response);
        }
    }

    fn garbage() -> Response {
        Response::Body(BlockBody {
            transactions: vec![b"garbage".to_vec()],
        })
    }
}

#[async_trait]
impl PeerTransport for SimNetwork {
    async fn send(
        &self,
        peer: &NodeId,
        request_id: RequestId,
        kind: &RequestKind,
    ) -> Result<(), TransportError> {
        let Some(manager) = self.manager.lock().upgrade() else {
            return Err(TransportError::Disconnected(*peer));
        };
        let peers = manager.peers();
        if !peers.contains(peer) {
            return Err(TransportError::Disconnected(*peer));
        }
        self.sent.lock().push((*peer, request_id, kind.clone()));

        let behavior = self.behaviors.lock().get(peer).copied().unwrap_or_default();
        let reply = match behavior {
            Behavior::Honest => (self.responder)(kind),
            Behavior::Corrupt => Some(Self::garbage()),
            Behavior::Silent => None,
            Behavior::Disconnect => {
                let _ = peers.unregister(peer);
                None
            }
        };

        if let Some(response) = reply {
            let manager = Arc::downgrade(&manager);
            let delay = self.delays.lock().get(peer).copied().unwrap_or_default();
            let peer = *peer;
            tokio::spawn(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Some(manager) = manager.upgrade() {
                    manager.deliver(&peer, request_id, response);
                }
            });
        }
        Ok(())
    }

    fn disconnect(&self, peer: &NodeId, reason: DisconnectReason) {
        self.disconnects.lock().push((*peer, reason));
    }
}
