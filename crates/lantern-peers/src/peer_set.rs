//! # Peer Set
//!
//! Registry of connected, capable serving peers.
//!
//! The map is the single owner of every [`Peer`]; the distributor, the
//! retrieval manager and the server pool hold `Arc<PeerSet>` and learn about
//! membership changes through [`PeerSet::subscribe`] (events) and
//! [`PeerSet::changed`] (wake-ups for anyone waiting on capacity).

use std::collections::HashMap;
use std::sync::Arc;

use lantern_types::{Hash, NodeId};
use parking_lot::RwLock;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info};

use crate::config::PeerSetConfig;
use crate::domain::{Peer, PeerEvent, PeerInfo, PeerSetError};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Thread-safe registry of connected peers.
pub struct PeerSet {
    config: PeerSetConfig,
    peers: RwLock<HashMap<NodeId, Arc<Peer>>>,
    events: broadcast::Sender<PeerEvent>,
    changed: Arc<Notify>,
}

impl PeerSet {
    /// Create an empty registry.
    pub fn new(config: PeerSetConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            peers: RwLock::new(HashMap::new()),
            events,
            changed: Arc::new(Notify::new()),
        }
    }

    /// Registry settings.
    pub fn config(&self) -> &PeerSetConfig {
        &self.config
    }

    /// Add a newly connected peer.
    pub fn register(&self, info: PeerInfo) -> Result<Arc<Peer>, PeerSetError> {
        if info.protocol_version < self.config.min_protocol_version {
            return Err(PeerSetError::ProtocolTooOld {
                peer: info.id,
                version: info.protocol_version,
                minimum: self.config.min_protocol_version,
            });
        }

        let id = info.id;
        let peer = {
            let mut peers = self.peers.write();
            if peers.contains_key(&id) {
                return Err(PeerSetError::AlreadyRegistered(id));
            }
            let peer = Arc::new(Peer::new(info, self.config.max_outstanding));
            peers.insert(id, Arc::clone(&peer));
            // Sent under the lock so events for one identity stay ordered
            let _ = self.events.send(PeerEvent::Registered(id));
            peer
        };

        info!(peer = %id, head = peer.head_number(), "Registered peer");
        self.changed.notify_waiters();
        Ok(peer)
    }

    /// Remove a peer and notify every holder of a reference.
    pub fn unregister(&self, id: &NodeId) -> Result<Arc<Peer>, PeerSetError> {
        let peer = {
            let mut peers = self.peers.write();
            let peer = peers.remove(id).ok_or(PeerSetError::NotFound(*id))?;
            peer.mark_unhealthy();
            let _ = self.events.send(PeerEvent::Unregistered(*id));
            peer
        };

        info!(peer = %id, outstanding = peer.outstanding(), "Unregistered peer");
        self.changed.notify_waiters();
        Ok(peer)
    }

    /// Look up a registered peer.
    pub fn get(&self, id: &NodeId) -> Option<Arc<Peer>> {
        self.peers.read().get(id).cloned()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.peers.read().contains_key(id)
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether no peer is registered.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }

    /// The peer with the highest advertised head (lowest id on ties).
    pub fn best_peer(&self) -> Option<Arc<Peer>> {
        self.peers
            .read()
            .values()
            .max_by(|a, b| {
                a.head_number()
                    .cmp(&b.head_number())
                    .then_with(|| b.id().cmp(&a.id()))
            })
            .cloned()
    }

    /// Copy of the current membership, ordered by id.
    ///
    /// The read lock is held only for the copy.
    pub fn snapshot(&self) -> Vec<Arc<Peer>> {
        let mut peers: Vec<Arc<Peer>> = self.peers.read().values().cloned().collect();
        peers.sort_by_key(|p| p.id());
        peers
    }

    /// Record a newly announced head for `id`.
    pub fn update_head(&self, id: &NodeId, number: u64, hash: Hash) -> Result<(), PeerSetError> {
        let peer = self.get(id).ok_or(PeerSetError::NotFound(*id))?;
        peer.set_head(number, hash);
        debug!(peer = %id, head = number, "Peer announced head");
        self.changed.notify_waiters();
        Ok(())
    }

    /// Atomically take one outstanding slot on `peer`.
    ///
    /// The slot is returned when the [`Reservation`] is dropped.
    pub fn reserve(&self, peer: &Arc<Peer>) -> Option<Reservation> {
        peer.try_acquire().then(|| Reservation {
            peer: Arc::clone(peer),
            changed: Arc::clone(&self.changed),
        })
    }

    /// Membership change events.
    pub fn subscribe(&self) -> broadcast::Receiver<PeerEvent> {
        self.events.subscribe()
    }

    /// Fires whenever membership, a head, or any peer's load changes.
    pub fn changed(&self) -> &Notify {
        &self.changed
    }
}

/// One outstanding-request slot on a peer, released exactly once on drop.
#[derive(Debug)]
pub struct Reservation {
    peer: Arc<Peer>,
    changed: Arc<Notify>,
}

impl Reservation {
    /// The reserved peer.
    pub fn peer(&self) -> &Arc<Peer> {
        &self.peer
    }

    /// The reserved peer's id.
    pub fn peer_id(&self) -> NodeId {
        self.peer.id()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.peer.release();
        self.changed.notify_waiters();
    }
}
