//! # Request Distributor
//!
//! Picks the peer that serves the next attempt of a request.
//!
//! Among registered peers passing the [`Eligibility`] predicate, the one with
//! the lowest cost wins:
//!
//! ```text
//! cost = outstanding / capacity - reputation_weight * score
//! ```
//!
//! Ties go to the lowest node id. The winner's outstanding slot is taken
//! atomically before `distribute` returns and is given back exactly once when
//! the [`PeerLease`] is completed or dropped.
//!
//! When nobody qualifies the request parks until the peer set reports a
//! change (registration, head update, released slot), the wait expires, or
//! shutdown fires.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lantern_peers::{Peer, PeerScorer, PeerSet, Reservation};
use lantern_types::{NodeId, ShutdownSignal};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::domain::DistributionError;

/// Which peers may serve a request.
#[derive(Debug, Clone, Default)]
pub struct Eligibility {
    /// Lowest acceptable advertised head.
    pub min_head: u64,
    /// Lowest acceptable protocol version.
    pub min_protocol: u32,
    /// Peers already tried for this request.
    pub excluded: HashSet<NodeId>,
}

impl Eligibility {
    /// Peers at or past `min_head`.
    pub fn with_min_head(min_head: u64) -> Self {
        Self {
            min_head,
            ..Self::default()
        }
    }

    /// Whether `peer` qualifies, ignoring load.
    pub fn admits(&self, peer: &Peer) -> bool {
        peer.is_healthy()
            && peer.head_number() >= self.min_head
            && peer.protocol_version() >= self.min_protocol
            && !self.excluded.contains(&peer.id())
    }
}

/// An assigned peer with one outstanding slot held.
#[derive(Debug)]
pub struct PeerLease {
    reservation: Reservation,
}

impl PeerLease {
    /// The assigned peer.
    pub fn peer(&self) -> &Arc<Peer> {
        self.reservation.peer()
    }

    /// The assigned peer's id.
    pub fn peer_id(&self) -> NodeId {
        self.reservation.peer_id()
    }

    /// Report the attempt finished, successfully or not.
    pub fn complete(self) {}
}

struct ParkedGuard<'a>(&'a AtomicUsize);

impl<'a> ParkedGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ParkedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Assigns requests to peers.
pub struct RequestDistributor {
    peers: Arc<PeerSet>,
    scorer: Arc<dyn PeerScorer>,
    reputation_weight: f64,
    wait: Duration,
    shutdown: ShutdownSignal,
    parked: AtomicUsize,
}

impl RequestDistributor {
    /// Distributor over `peers`, ranking by `scorer`.
    pub fn new(
        peers: Arc<PeerSet>,
        scorer: Arc<dyn PeerScorer>,
        reputation_weight: f64,
        wait: Duration,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            peers,
            scorer,
            reputation_weight,
            wait,
            shutdown,
            parked: AtomicUsize::new(0),
        }
    }

    /// Requests currently parked.
    pub fn parked(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }

    fn cost(&self, peer: &Peer) -> f64 {
        let load = peer.outstanding() as f64 / f64::from(peer.capacity());
        load - self.reputation_weight * self.scorer.score(&peer.id())
    }

    /// Assign a peer now if one qualifies.
    pub fn try_distribute(&self, eligibility: &Eligibility) -> Option<PeerLease> {
        let mut ranked: Vec<(f64, Arc<Peer>)> = self
            .peers
            .snapshot()
            .into_iter()
            .filter(|peer| eligibility.admits(peer) && peer.has_capacity())
            .map(|peer| (self.cost(&peer), peer))
            .collect();
        ranked.sort_by(|(a_cost, a), (b_cost, b)| {
            a_cost
                .partial_cmp(b_cost)
                .unwrap_or(CmpOrdering::Equal)
                .then_with(|| a.id().cmp(&b.id()))
        });

        // A peer can fill up between the snapshot and the reservation
        ranked.iter().find_map(|(cost, peer)| {
            let reservation = self.peers.reserve(peer)?;
            trace!(peer = %peer.id(), cost, "Assigned peer");
            Some(PeerLease { reservation })
        })
    }

    /// Assign a peer, parking until one qualifies.
    pub async fn distribute(
        &self,
        eligibility: &Eligibility,
    ) -> Result<PeerLease, DistributionError> {
        let deadline = Instant::now() + self.wait;
        let mut shutdown = self.shutdown.clone();

        loop {
            // Registered before the check so a change in between still wakes us
            let notified = self.peers.changed().notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if shutdown.is_triggered() {
                return Err(DistributionError::Cancelled);
            }
            if let Some(lease) = self.try_distribute(eligibility) {
                return Ok(lease);
            }

            let _parked = ParkedGuard::new(&self.parked);
            debug!(
                min_head = eligibility.min_head,
                excluded = eligibility.excluded.len(),
                "No eligible peer, parking request"
            );
            tokio::select! {
                biased;
                _ = shutdown.triggered() => return Err(DistributionError::Cancelled),
                _ = &mut notified => {}
                _ = tokio::time::sleep_until(deadline) => {
                    return Err(DistributionError::NoEligiblePeer);
                }
            }
        }
    }
}
