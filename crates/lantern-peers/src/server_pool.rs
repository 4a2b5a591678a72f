//! # Server Pool
//!
//! Keeps a candidate set larger than the connected set and dials candidates
//! until [`ServerPoolConfig::target_connections`] peers are registered.
//!
//! ## Dial order
//!
//! 1. Candidates in good standing before demoted ones
//! 2. Higher dial priority (score minus dial-failure penalty) first
//! 3. Lower id first, for determinism
//!
//! A failed dial schedules the next attempt after an exponential backoff with
//! up to 10% random jitter. A peer whose reputation falls below the drop
//! threshold is removed from the candidate set, unregistered and
//! disconnected.

use std::collections::HashMap;
use std::sync::Arc;

use lantern_types::{NodeId, ShutdownSignal};
use parking_lot::Mutex;
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ServerPoolConfig;
use crate::domain::{
    DialError, DisconnectReason, Outcome, PeerCandidate, PeerInfo, PeerSetError, PoolError,
    Standing,
};
use crate::peer_set::PeerSet;
use crate::ports::{Dialer, PeerScorer, PeerTransport};
use crate::reputation_table::ReputationTable;

#[derive(Debug, Clone)]
struct CandidateState {
    address: String,
    next_dial_at: Instant,
    dialing: bool,
}

/// Parse a `hexid@address` bootnode entry.
pub fn parse_bootnode(entry: &str) -> Result<PeerCandidate, PoolError> {
    let invalid = |reason: String| PoolError::InvalidBootnode {
        entry: entry.to_string(),
        reason,
    };
    let (id, address) = entry
        .split_once('@')
        .ok_or_else(|| invalid("missing '@'".to_string()))?;
    if address.is_empty() {
        return Err(invalid("empty address".to_string()));
    }
    let id: NodeId = id.parse().map_err(|e| invalid(format!("{e}")))?;
    Ok(PeerCandidate {
        id,
        address: address.to_string(),
    })
}

/// Dials, ranks and prunes serving peers.
pub struct ServerPool {
    config: ServerPoolConfig,
    peers: Arc<PeerSet>,
    reputation: Arc<ReputationTable>,
    dialer: Arc<dyn Dialer>,
    transport: Arc<dyn PeerTransport>,
    candidates: Mutex<HashMap<NodeId, CandidateState>>,
}

impl ServerPool {
    /// Create a pool seeded from persisted reputation and the bootnodes.
    pub fn new(
        config: ServerPoolConfig,
        peers: Arc<PeerSet>,
        reputation: Arc<ReputationTable>,
        dialer: Arc<dyn Dialer>,
        transport: Arc<dyn PeerTransport>,
    ) -> Result<Self, PoolError> {
        let bootnodes = config
            .bootnodes
            .iter()
            .map(|entry| parse_bootnode(entry))
            .collect::<Result<Vec<_>, _>>()?;

        let pool = Self {
            config,
            peers,
            reputation,
            dialer,
            transport,
            candidates: Mutex::new(HashMap::new()),
        };

        let mut known: Vec<_> = pool
            .reputation
            .snapshot()
            .into_iter()
            .filter(|(_, record)| !record.address.is_empty())
            .collect();
        let rep_config = pool.reputation.config().clone();
        known.sort_by(|(a_id, a), (b_id, b)| {
            b.dial_priority(&rep_config)
                .total_cmp(&a.dial_priority(&rep_config))
                .then_with(|| a_id.cmp(b_id))
        });
        for (id, record) in known {
            pool.add_candidate(PeerCandidate {
                id,
                address: record.address,
            });
        }
        for candidate in bootnodes {
            pool.add_candidate(candidate);
        }

        info!(candidates = pool.candidate_count(), "Server pool initialised");
        Ok(pool)
    }

    /// Pool settings.
    pub fn config(&self) -> &ServerPoolConfig {
        &self.config
    }

    /// The shared reputation table.
    pub fn reputation(&self) -> &Arc<ReputationTable> {
        &self.reputation
    }

    /// Add a discovered candidate. Returns false if it was rejected.
    ///
    /// Dropped peers are refused. When the set is full the lowest-priority
    /// idle candidate is evicted, but only if the newcomer ranks higher.
    pub fn add_candidate(&self, candidate: PeerCandidate) -> bool {
        if self.reputation.standing(&candidate.id) == Standing::Dropped {
            debug!(peer = %candidate.id, "Refusing dropped candidate");
            return false;
        }

        let rep_config = self.reputation.config();
        let priority_of = |id: &NodeId| {
            self.reputation
                .get(id)
                .map_or(0.0, |r| r.dial_priority(rep_config))
        };

        let mut candidates = self.candidates.lock();
        if let Some(existing) = candidates.get_mut(&candidate.id) {
            existing.address = candidate.address.clone();
        } else {
            if candidates.len() >= self.config.max_candidates {
                let newcomer = priority_of(&candidate.id);
                let victim = candidates
                    .iter()
                    .filter(|(id, state)| !state.dialing && !self.peers.contains(id))
                    .map(|(id, _)| (*id, priority_of(id)))
                    .min_by(|(a_id, a), (b_id, b)| a.total_cmp(b).then_with(|| b_id.cmp(a_id)));
                match victim {
                    Some((victim, priority)) if priority < newcomer => {
                        candidates.remove(&victim);
                        debug!(evicted = %victim, "Candidate set full, evicted lowest priority");
                    }
                    _ => return false,
                }
            }
            candidates.insert(
                candidate.id,
                CandidateState {
                    address: candidate.address.clone(),
                    next_dial_at: Instant::now(),
                    dialing: false,
                },
            );
        }
        drop(candidates);

        self.reputation.remember(&candidate.id, &candidate.address);
        true
    }

    /// Number of known candidates (connected or not).
    pub fn candidate_count(&self) -> usize {
        self.candidates.lock().len()
    }

    /// Whether `id` is in the candidate set.
    pub fn is_candidate(&self, id: &NodeId) -> bool {
        self.candidates.lock().contains_key(id)
    }

    /// Number of connected peers.
    pub fn connected_count(&self) -> usize {
        self.peers.len()
    }

    /// Pick the candidates to dial now and mark them as dialing.
    fn select_dials(&self, now: Instant) -> Vec<PeerCandidate> {
        let mut candidates = self.candidates.lock();
        let in_progress = candidates.values().filter(|c| c.dialing).count();
        let needed = self
            .config
            .target_connections
            .saturating_sub(self.peers.len() + in_progress);
        if needed == 0 {
            return Vec::new();
        }

        let rep_config = self.reputation.config();
        let mut ready: Vec<(NodeId, bool, f64)> = candidates
            .iter()
            .filter(|(id, state)| {
                !state.dialing && state.next_dial_at <= now && !self.peers.contains(id)
            })
            .map(|(id, _)| {
                let record = self.reputation.get(id);
                let demoted = record
                    .as_ref()
                    .is_some_and(|r| r.standing(rep_config) == Standing::Demoted);
                let priority = record.map_or(0.0, |r| r.dial_priority(rep_config));
                (*id, demoted, priority)
            })
            .collect();
        ready.sort_by(|(a_id, a_demoted, a), (b_id, b_demoted, b)| {
            a_demoted
                .cmp(b_demoted)
                .then_with(|| b.total_cmp(a))
                .then_with(|| a_id.cmp(b_id))
        });

        ready
            .into_iter()
            .take(needed)
            .filter_map(|(id, _, _)| {
                let state = candidates.get_mut(&id)?;
                state.dialing = true;
                Some(PeerCandidate {
                    id,
                    address: state.address.clone(),
                })
            })
            .collect()
    }

    /// Run one dial round. Returns the number of newly registered peers.
    pub async fn dial_round(&self) -> usize {
        let batch = self.select_dials(Instant::now());
        if batch.is_empty() {
            return 0;
        }

        let dialer = &self.dialer;
        let results = futures::future::join_all(batch.into_iter().map(|candidate| async move {
            let result = dialer.dial(&candidate).await;
            (candidate, result)
        }))
        .await;

        let mut connected = 0;
        for (candidate, result) in results {
            let result = result.and_then(|info| {
                if info.id == candidate.id {
                    Ok(info)
                } else {
                    Err(DialError::IdentityMismatch {
                        expected: candidate.id,
                        actual: info.id,
                    })
                }
            });
            match result {
                Ok(info) => {
                    if self.on_dial_success(&candidate, info) {
                        connected += 1;
                    }
                }
                Err(e) => self.on_dial_failure(&candidate, &e),
            }
        }
        connected
    }

    fn on_dial_success(&self, candidate: &PeerCandidate, info: PeerInfo) -> bool {
        match self.peers.register(info) {
            Ok(_) | Err(PeerSetError::AlreadyRegistered(_)) => {
                self.reputation.record(&candidate.id, Outcome::Connected);
                if let Some(state) = self.candidates.lock().get_mut(&candidate.id) {
                    state.dialing = false;
                }
                true
            }
            Err(e) => {
                warn!(peer = %candidate.id, error = %e, "Dialed peer is not usable");
                self.transport
                    .disconnect(&candidate.id, DisconnectReason::Incompatible);
                self.on_dial_failure(candidate, &DialError::Handshake(e.to_string()));
                false
            }
        }
    }

    fn on_dial_failure(&self, candidate: &PeerCandidate, error: &DialError) {
        let record = self.reputation.record(&candidate.id, Outcome::DialFailure);
        let delay = self.config.backoff(record.dial_failures);
        let jitter_ms = rand::thread_rng().gen_range(0..=delay.as_millis() as u64 / 10);
        let delay = (delay + std::time::Duration::from_millis(jitter_ms))
            .min(std::time::Duration::from_millis(self.config.backoff_max_ms));

        if let Some(state) = self.candidates.lock().get_mut(&candidate.id) {
            state.dialing = false;
            state.next_dial_at = Instant::now() + delay;
        }
        debug!(
            peer = %candidate.id,
            error = %error,
            failures = record.dial_failures,
            backoff_ms = delay.as_millis() as u64,
            "Dial failed"
        );
    }

    /// Fold an interaction outcome into reputation and enforce the health
    /// policy. Returns the peer's resulting standing.
    pub fn record_outcome(&self, id: &NodeId, outcome: Outcome) -> Standing {
        let record = self.reputation.record(id, outcome);
        let standing = record.standing(self.reputation.config());
        match standing {
            Standing::Dropped => self.drop_peer(id),
            Standing::Demoted => {
                debug!(peer = %id, score = record.score, ?outcome, "Peer demoted");
            }
            Standing::Good => {}
        }
        standing
    }

    fn drop_peer(&self, id: &NodeId) {
        let was_candidate = self.candidates.lock().remove(id).is_some();
        let was_connected = self.peers.unregister(id).is_ok();
        if was_connected {
            self.transport.disconnect(id, DisconnectReason::Dropped);
        }
        if was_candidate || was_connected {
            warn!(peer = %id, "Dropped peer for misbehaviour");
        }
    }

    /// Dial loop. Returns once `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        info!(target = self.config.target_connections, "Server pool started");
        loop {
            tokio::select! {
                _ = shutdown.triggered() => break,
                _ = self.dial_round() => {}
            }
            tokio::select! {
                _ = shutdown.triggered() => break,
                _ = tokio::time::sleep(self.config.dial_interval()) => {}
            }
        }
        info!("Server pool stopped");
    }
}

impl PeerScorer for ServerPool {
    fn score(&self, peer: &NodeId) -> f64 {
        self.reputation.score(peer)
    }

    fn record(&self, peer: &NodeId, outcome: Outcome) {
        self.record_outcome(peer, outcome);
    }
}
