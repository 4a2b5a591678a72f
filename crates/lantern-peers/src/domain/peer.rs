//! # Connected Peers
//!
//! A [`Peer`] is created on registration and shared by reference with the
//! distributor and the retrieval manager. Its outstanding-request counter is
//! the only hot mutable field and is updated lock-free.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use lantern_types::{Hash, NodeId};
use parking_lot::RwLock;

/// What a peer advertised during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Stable identity.
    pub id: NodeId,
    /// Transport address the peer was reached at.
    pub address: String,
    /// Best known head number.
    pub head_number: u64,
    /// Best known head hash.
    pub head_hash: Hash,
    /// Relative request-serving weight (at least 1).
    pub capacity: u32,
    /// Protocol version spoken.
    pub protocol_version: u32,
}

/// A dialable candidate known to the server pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCandidate {
    /// Expected identity.
    pub id: NodeId,
    /// Where to dial.
    pub address: String,
}

/// Registry membership changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A peer became available.
    Registered(NodeId),
    /// A peer left. In-flight requests routed to it must fail immediately.
    Unregistered(NodeId),
}

/// Why we are disconnecting a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Reputation fell below the drop threshold.
    Dropped,
    /// Handshake succeeded but the peer cannot serve us.
    Incompatible,
    /// Local shutdown.
    Shutdown,
}

/// A registered, connected peer.
#[derive(Debug)]
pub struct Peer {
    id: NodeId,
    info: RwLock<PeerInfo>,
    outstanding: AtomicUsize,
    ceiling: usize,
    healthy: AtomicBool,
}

impl Peer {
    pub(crate) fn new(info: PeerInfo, ceiling: usize) -> Self {
        Self {
            id: info.id,
            info: RwLock::new(info),
            outstanding: AtomicUsize::new(0),
            ceiling: ceiling.max(1),
            healthy: AtomicBool::new(true),
        }
    }

    /// Peer identity.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Copy of the advertised info.
    pub fn info(&self) -> PeerInfo {
        self.info.read().clone()
    }

    /// Advertised head number.
    pub fn head_number(&self) -> u64 {
        self.info.read().head_number
    }

    /// Advertised capacity, never zero.
    pub fn capacity(&self) -> u32 {
        self.info.read().capacity.max(1)
    }

    /// Advertised protocol version.
    pub fn protocol_version(&self) -> u32 {
        self.info.read().protocol_version
    }

    /// Requests currently assigned and not yet completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Concurrency ceiling.
    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Whether the peer is still registered and usable.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Whether another request could be assigned right now.
    pub fn has_capacity(&self) -> bool {
        self.is_healthy() && self.outstanding() < self.ceiling
    }

    pub(crate) fn set_head(&self, number: u64, hash: Hash) {
        let mut info = self.info.write();
        if number >= info.head_number {
            info.head_number = number;
            info.head_hash = hash;
        }
    }

    pub(crate) fn mark_unhealthy(&self) {
        self.healthy.store(false, Ordering::Release);
    }

    /// Increment the outstanding count unless it is at the ceiling.
    pub(crate) fn try_acquire(&self) -> bool {
        if !self.is_healthy() {
            return false;
        }
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.ceiling).then_some(n + 1)
            })
            .is_ok()
    }

    /// Decrement the outstanding count; saturates at zero.
    pub(crate) fn release(&self) {
        let _ = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }
}
