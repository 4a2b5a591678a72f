//! Correlation of replies to in-flight attempts.
//!
//! Each attempt registers a fresh [`RequestId`] bound to the peer it was sent
//! to and gets the receiving half of a oneshot. Replies complete the entry
//! only when both the id and the sender match. Ids of attempts that already
//! ended are remembered for a while so their replies count as late rather
//! than unsolicited.

use std::num::NonZeroUsize;

use dashmap::DashMap;
use lantern_types::{NodeId, RequestId, Response};
use lru::LruCache;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;
use uuid::Uuid;

/// How a delivered reply was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the waiting attempt.
    Accepted,
    /// No attempt with this id is waiting.
    Unknown,
    /// The id belongs to an attempt sent to a different peer.
    WrongPeer,
    /// The attempt already ended (deadline, peer replaced, cancelled).
    Late,
}

struct PendingReply {
    peer: NodeId,
    sender: oneshot::Sender<Response>,
}

const EXPIRED_CAPACITY: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(n) => n,
    None => NonZeroUsize::MIN,
};

pub(crate) struct PendingReplies {
    pending: DashMap<RequestId, PendingReply>,
    expired: Mutex<LruCache<RequestId, NodeId>>,
}

impl Default for PendingReplies {
    fn default() -> Self {
        Self {
            pending: DashMap::new(),
            expired: Mutex::new(LruCache::new(EXPIRED_CAPACITY)),
        }
    }
}

impl PendingReplies {
    pub(crate) fn register(&self, peer: NodeId) -> (RequestId, oneshot::Receiver<Response>) {
        let id = Uuid::new_v4();
        let (sender, receiver) = oneshot::channel();
        self.pending.insert(id, PendingReply { peer, sender });
        trace!(request_id = %id, peer = %peer, "Registered pending reply");
        (id, receiver)
    }

    pub(crate) fn complete(&self, peer: &NodeId, id: RequestId, response: Response) -> Delivery {
        match self.pending.remove_if(&id, |_, pending| pending.peer == *peer) {
            Some((_, pending)) => match pending.sender.send(response) {
                Ok(()) => Delivery::Accepted,
                Err(_) => Delivery::Late,
            },
            None if self.pending.contains_key(&id) => Delivery::WrongPeer,
            None => {
                let mut expired = self.expired.lock();
                match expired.peek(&id) {
                    Some(owner) if owner == peer => {
                        expired.pop(&id);
                        Delivery::Late
                    }
                    Some(_) => Delivery::WrongPeer,
                    None => Delivery::Unknown,
                }
            }
        }
    }

    pub(crate) fn cancel(&self, id: &RequestId) {
        if let Some((id, pending)) = self.pending.remove(id) {
            self.expired.lock().put(id, pending.peer);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Removes an attempt's entry however the attempt ends.
pub(crate) struct PendingGuard<'a> {
    pending: &'a PendingReplies,
    id: RequestId,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(pending: &'a PendingReplies, id: RequestId) -> Self {
        Self { pending, id }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.cancel(&self.id);
    }
}
