//! # Retrieve Manager
//!
//! Owns each logical retrieval from submission to a validated value or a
//! terminal error.
//!
//! ```text
//! Pending ──distribute──▶ Sent ──reply──▶ validate ──ok──▶ Done
//!    ▲                     │                 │
//!    │                     ├─deadline──▶ TimedOut
//!    │                     ├─peer left─▶ Disconnected
//!    │                     │                 └─bad──▶ Rejected
//!    └──── budget left ◀───┴── (peer excluded for this request)
//! ```
//!
//! Immutable requests with the same [`RequestKind`] share one in-flight
//! retrieval; every caller receives the same result once its own validator
//! accepts it. `LatestHeader` and `HeaderByNumber` are never shared.
//!
//! Reputation: success rewards the peer, a timeout costs less than an invalid
//! reply, a disconnect costs nothing. A reply that breaks consensus rules
//! penalises the peer and ends the retrieval immediately.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use lantern_peers::{Outcome, PeerEvent, PeerScorer, PeerSet, PeerTransport};
use lantern_types::{NodeId, RequestId, RequestKind, Response, ShutdownSignal};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::distributor::{Eligibility, PeerLease, RequestDistributor};
use crate::domain::{DistributionError, Request, RetrievalError, ValidationError};
use crate::metrics;
use crate::pending::{Delivery, PendingGuard, PendingReplies};

type SharedRetrieval = Shared<BoxFuture<'static, Result<Response, RetrievalError>>>;

/// Counters for status reporting.
#[derive(Debug, Default)]
pub struct RetrievalStats {
    /// Requests sent on the wire.
    pub wire_sends: AtomicU64,
    /// Callers that joined an existing in-flight retrieval.
    pub coalesced: AtomicU64,
    /// Retrievals that returned a validated value.
    pub succeeded: AtomicU64,
    /// Retrievals that ended in a terminal error.
    pub failed: AtomicU64,
    /// Replies that matched no in-flight attempt.
    pub unsolicited: AtomicU64,
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl<'a> ActiveGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Verified retrieval from untrusted peers.
pub struct RetrieveManager {
    config: RetrievalConfig,
    peers: Arc<PeerSet>,
    distributor: RequestDistributor,
    transport: Arc<dyn PeerTransport>,
    scorer: Arc<dyn PeerScorer>,
    pending: PendingReplies,
    in_flight: DashMap<RequestKind, SharedRetrieval>,
    active: AtomicUsize,
    stats: RetrievalStats,
    shutdown: ShutdownSignal,
}

impl RetrieveManager {
    /// Wire a manager to the peer set, transport and reputation.
    pub fn new(
        config: RetrievalConfig,
        peers: Arc<PeerSet>,
        transport: Arc<dyn PeerTransport>,
        scorer: Arc<dyn PeerScorer>,
        shutdown: ShutdownSignal,
    ) -> Self {
        let distributor = RequestDistributor::new(
            Arc::clone(&peers),
            Arc::clone(&scorer),
            config.reputation_weight,
            config.distribution_wait(),
            shutdown.clone(),
        );
        Self {
            config,
            peers,
            distributor,
            transport,
            scorer,
            pending: PendingReplies::default(),
            in_flight: DashMap::new(),
            active: AtomicUsize::new(0),
            stats: RetrievalStats::default(),
            shutdown,
        }
    }

    /// Retrieval settings.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// The peer registry attempts are sent into.
    pub fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    /// The distributor used for peer assignment.
    pub fn distributor(&self) -> &RequestDistributor {
        &self.distributor
    }

    /// Counters.
    pub fn stats(&self) -> &RetrievalStats {
        &self.stats
    }

    /// Logical retrievals in progress.
    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Attempts waiting for a reply.
    pub fn pending_attempts(&self) -> usize {
        self.pending.len()
    }

    /// Fetch and validate, coalescing with an identical in-flight request
    /// when the answer cannot change.
    ///
    /// A coalesced retrieval runs on its own task so that dropping any caller,
    /// the first one included, never stalls the others. Every joining caller
    /// checks the shared value with its own validator and retrieves alone if
    /// it rejects it.
    pub async fn retrieve(self: &Arc<Self>, request: Request) -> Result<Response, RetrievalError> {
        if request.kind.is_mutable() {
            return self.run(request).await;
        }

        let (shared, joined) = match self.in_flight.entry(request.kind.clone()) {
            Entry::Occupied(entry) => {
                self.stats.coalesced.fetch_add(1, Ordering::Relaxed);
                metrics::record_coalesced();
                debug!(request = %request.kind, "Joined in-flight retrieval");
                (entry.get().clone(), true)
            }
            Entry::Vacant(entry) => {
                let retrieval = self.spawn_shared(request.clone());
                entry.insert(retrieval.clone());
                (retrieval, false)
            }
        };

        let response = shared.await?;
        if !joined {
            return Ok(response);
        }
        match request.validator.validate(&response) {
            Ok(()) => Ok(response),
            Err(reason) => {
                debug!(
                    request = %request.kind,
                    reason = %reason,
                    "Shared value rejected by joining caller, retrieving alone"
                );
                self.run(request).await
            }
        }
    }

    fn spawn_shared(self: &Arc<Self>, request: Request) -> SharedRetrieval {
        let manager = Arc::clone(self);
        let kind = request.kind.clone();
        let label = kind.to_string();
        let task = tokio::spawn(async move {
            let result = manager.run(request).await;
            manager.in_flight.remove(&kind);
            result
        });
        async move {
            task.await.unwrap_or_else(|e| {
                warn!(request = %label, error = %e, "Shared retrieval task aborted");
                Err(RetrievalError::Cancelled { request: label })
            })
        }
        .boxed()
        .shared()
    }

    /// Hand a reply from `peer` to the attempt waiting on `request_id`.
    ///
    /// Replies nobody is waiting for, or sent by a peer other than the one
    /// asked, are dropped and count against the sender.
    pub fn deliver(&self, peer: &NodeId, request_id: RequestId, response: Response) -> Delivery {
        let delivery = self.pending.complete(peer, request_id, response);
        match delivery {
            Delivery::Unknown | Delivery::WrongPeer => {
                self.stats.unsolicited.fetch_add(1, Ordering::Relaxed);
                metrics::record_unsolicited();
                debug!(peer = %peer, request_id = %request_id, ?delivery, "Unsolicited reply");
                self.scorer.record(peer, Outcome::Unsolicited);
            }
            Delivery::Late => {
                debug!(peer = %peer, request_id = %request_id, "Reply arrived after attempt ended");
            }
            Delivery::Accepted => {}
        }
        delivery
    }

    async fn run(&self, request: Request) -> Result<Response, RetrievalError> {
        let _active = ActiveGuard::new(&self.active);
        let result = self.run_attempts(&request).await;
        match &result {
            Ok(_) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Retrieval failed");
            }
        }
        result
    }

    async fn run_attempts(&self, request: &Request) -> Result<Response, RetrievalError> {
        let label = request.kind.to_string();
        let mut eligibility = Eligibility {
            min_head: request.min_head,
            min_protocol: 0,
            excluded: HashSet::new(),
        };
        let mut attempts = 0u32;
        let mut last_peer = None;
        let mut last_error: Option<RetrievalError> = None;

        while attempts < request.retry_budget {
            let lease = match self.distributor.distribute(&eligibility).await {
                Ok(lease) => lease,
                Err(DistributionError::Cancelled) => {
                    return Err(RetrievalError::Cancelled { request: label });
                }
                Err(DistributionError::NoEligiblePeer) => match last_error {
                    None => return Err(RetrievalError::NoEligiblePeer { request: label }),
                    Some(previous) => {
                        return Err(RetrievalError::RetrievalFailed {
                            request: label,
                            attempts,
                            last_peer,
                            last_error: Box::new(previous),
                        });
                    }
                },
            };

            attempts += 1;
            let peer = lease.peer_id();
            last_peer = Some(peer);
            eligibility.excluded.insert(peer);

            let outcome = self.attempt(request, &label, &lease, attempts).await;
            lease.complete();

            match outcome {
                Ok(response) => {
                    self.scorer.record(&peer, Outcome::Success);
                    debug!(request = %label, peer = %peer, attempt = attempts, "Retrieved");
                    return Ok(response);
                }
                Err(error) => {
                    match &error {
                        RetrievalError::Timeout { .. } => {
                            metrics::record_timeout();
                            self.scorer.record(&peer, Outcome::Timeout);
                        }
                        RetrievalError::InvalidResponse { .. } => {
                            metrics::record_invalid_response();
                            self.scorer.record(&peer, Outcome::InvalidResponse);
                        }
                        RetrievalError::HeaderRejected { .. } => {
                            metrics::record_invalid_response();
                            self.scorer.record(&peer, Outcome::InvalidResponse);
                            return Err(error);
                        }
                        RetrievalError::Cancelled { .. } => return Err(error),
                        _ => {}
                    }
                    debug!(
                        request = %label,
                        peer = %peer,
                        attempt = attempts,
                        budget = request.retry_budget,
                        error = %error,
                        "Attempt failed"
                    );
                    last_error = Some(error);
                }
            }
        }

        Err(RetrievalError::RetrievalFailed {
            request: label.clone(),
            attempts,
            last_peer,
            last_error: Box::new(
                last_error.unwrap_or(RetrievalError::NoEligiblePeer { request: label }),
            ),
        })
    }

    async fn attempt(
        &self,
        request: &Request,
        label: &str,
        lease: &PeerLease,
        attempt: u32,
    ) -> Result<Response, RetrievalError> {
        let peer = lease.peer_id();
        let disconnected = || RetrievalError::PeerDisconnected {
            request: label.to_string(),
            peer,
        };

        // Subscribed before the health check so a removal in between is seen
        let mut events = self.peers.subscribe();
        if !lease.peer().is_healthy() {
            return Err(disconnected());
        }

        let (request_id, mut reply) = self.pending.register(peer);
        let _pending = PendingGuard::new(&self.pending, request_id);

        self.stats.wire_sends.fetch_add(1, Ordering::Relaxed);
        metrics::record_wire_send();
        if let Err(e) = self.transport.send(&peer, request_id, &request.kind).await {
            return Err(RetrievalError::SendFailed {
                request: label.to_string(),
                peer,
                reason: e.to_string(),
            });
        }
        debug!(request = %label, peer = %peer, request_id = %request_id, attempt, "Request sent");

        let deadline = tokio::time::sleep(request.timeout);
        tokio::pin!(deadline);
        let mut shutdown = self.shutdown.clone();

        let response = loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    return Err(RetrievalError::Cancelled { request: label.to_string() });
                }
                reply = &mut reply => match reply {
                    Ok(response) => break response,
                    Err(_) => return Err(disconnected()),
                },
                event = events.recv() => match event {
                    Ok(PeerEvent::Unregistered(id)) if id == peer => return Err(disconnected()),
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => {
                        if !lease.peer().is_healthy() {
                            return Err(disconnected());
                        }
                    }
                    Err(RecvError::Closed) => return Err(disconnected()),
                },
                _ = &mut deadline => {
                    return Err(RetrievalError::Timeout {
                        request: label.to_string(),
                        peer,
                        after_ms: request.timeout.as_millis() as u64,
                    });
                }
            }
        };

        request.validator.validate(&response).map_err(|reason| match reason {
            ValidationError::Consensus(error) => RetrievalError::HeaderRejected {
                request: label.to_string(),
                peer,
                error,
            },
            reason => RetrievalError::InvalidResponse {
                request: label.to_string(),
                peer,
                reason,
            },
        })?;
        Ok(response)
    }

    /// Log final counters.
    pub fn log_summary(&self) {
        info!(
            wire_sends = self.stats.wire_sends.load(Ordering::Relaxed),
            coalesced = self.stats.coalesced.load(Ordering::Relaxed),
            succeeded = self.stats.succeeded.load(Ordering::Relaxed),
            failed = self.stats.failed.load(Ordering::Relaxed),
            unsolicited = self.stats.unsolicited.load(Ordering::Relaxed),
            "Retrieval summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Behavior, SimNetwork};
    use crate::validation::{
        HeaderHashValidator, HeaderNumberValidator, LatestHeaderValidator, ResponseValidator,
    };
    use futures::future::join_all;
    use lantern_consensus::{ConsensusConfig, FakeSeal, FixedTimeSource, HeaderVerifier};
    use lantern_peers::test_utils::{peer_info, RecordingScorer};
    use lantern_peers::PeerSetConfig;
    use lantern_types::test_utils::{build_chain, genesis_header};
    use lantern_types::{Hash, Header, Shutdown};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::Instant;
    use uuid::Uuid;

    fn id(byte: u8) -> NodeId {
        NodeId::new([byte; 32])
    }

    struct Harness {
        manager: Arc<RetrieveManager>,
        network: Arc<SimNetwork>,
        scorer: Arc<RecordingScorer>,
        peers: Arc<PeerSet>,
        headers: Vec<Header>,
    }

    fn harness(
        peer_count: u8,
        ceiling: usize,
        shutdown: ShutdownSignal,
        extra: impl Fn(&RequestKind) -> Option<Response> + Send + Sync + 'static,
    ) -> Harness {
        let peers = Arc::new(PeerSet::new(PeerSetConfig {
            max_outstanding: ceiling,
            min_protocol_version: 2,
        }));
        for byte in 1..=peer_count {
            peers.register(peer_info(byte, 100)).unwrap();
        }

        let headers = build_chain(&genesis_header(), 5, 0);
        let by_hash: HashMap<Hash, Header> =
            headers.iter().map(|h| (h.hash(), h.clone())).collect();
        let network = SimNetwork::new(move |kind| match kind {
            RequestKind::HeaderByHash { hash } => {
                by_hash.get(hash).map(|h| Response::Headers(vec![h.clone()]))
            }
            other => extra(other),
        });

        let scorer = Arc::new(RecordingScorer::new());
        let manager = Arc::new(RetrieveManager::new(
            RetrievalConfig::for_testing(),
            Arc::clone(&peers),
            network.clone(),
            scorer.clone(),
            shutdown,
        ));
        network.attach(&manager);
        Harness {
            manager,
            network,
            scorer,
            peers,
            headers,
        }
    }

    fn no_extra(_: &RequestKind) -> Option<Response> {
        None
    }

    fn header_request(h: &Harness, index: usize) -> Request {
        let hash = h.headers[index].hash();
        Request::new(
            RequestKind::HeaderByHash { hash },
            HeaderHashValidator::new(hash),
            h.manager.config(),
        )
    }

    // =========================================================================
    // TEST GROUP 1: Attempts and retries
    // =========================================================================

    #[tokio::test]
    async fn test_success_rewards_peer() {
        let h = harness(1, 2, ShutdownSignal::never(), no_extra);
        let response = h.manager.retrieve(header_request(&h, 0)).await.unwrap();

        assert_eq!(response, Response::Headers(vec![h.headers[0].clone()]));
        assert_eq!(h.scorer.outcomes(), vec![(id(1), Outcome::Success)]);
        assert_eq!(h.network.sent().len(), 1);
        assert_eq!(h.manager.pending_attempts(), 0);
        assert_eq!(h.manager.in_flight(), 0);
        assert_eq!(h.peers.get(&id(1)).unwrap().outstanding(), 0);
    }

    #[tokio::test]
    async fn test_invalid_reply_retried_on_another_peer() {
        let h = harness(2, 2, ShutdownSignal::never(), no_extra);
        h.network.set_behavior(id(1), Behavior::Corrupt);

        assert!(h.manager.retrieve(header_request(&h, 1)).await.is_ok());
        assert_eq!(
            h.scorer.outcomes(),
            vec![(id(1), Outcome::InvalidResponse), (id(2), Outcome::Success)]
        );
    }

    #[tokio::test]
    async fn test_budget_bounds_attempts() {
        let h = harness(3, 2, ShutdownSignal::never(), no_extra);
        for byte in 1..=3 {
            h.network.set_behavior(id(byte), Behavior::Corrupt);
        }

        let err = h
            .manager
            .retrieve(header_request(&h, 2).with_retry_budget(2))
            .await
            .unwrap_err();
        match err {
            RetrievalError::RetrievalFailed {
                attempts,
                last_peer,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_peer, Some(id(2)));
                assert!(matches!(*last_error, RetrievalError::InvalidResponse { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(h.network.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_no_alternate_peer() {
        let h = harness(1, 2, ShutdownSignal::never(), no_extra);
        h.network.set_behavior(id(1), Behavior::Silent);

        let started = Instant::now();
        let err = h.manager.retrieve(header_request(&h, 0)).await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(
            &err,
            RetrievalError::RetrievalFailed { attempts: 1, last_error, .. }
                if matches!(**last_error, RetrievalError::Timeout { after_ms: 100, .. })
        ));
        // Deadline plus the distribution wait for an alternate
        assert!(elapsed >= Duration::from_millis(150));
        assert!(elapsed < Duration::from_millis(200));
        assert_eq!(h.scorer.outcomes(), vec![(id(1), Outcome::Timeout)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_peer_at_all() {
        let h = harness(0, 2, ShutdownSignal::never(), no_extra);
        let err = h.manager.retrieve(header_request(&h, 0)).await.unwrap_err();
        assert!(matches!(err, RetrievalError::NoEligiblePeer { .. }));
        assert!(h.network.sent().is_empty());
    }

    // =========================================================================
    // TEST GROUP 2: Coalescing
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_identical_immutable_requests_share_one_send() {
        let h = harness(3, 2, ShutdownSignal::never(), no_extra);
        for byte in 1..=3 {
            h.network.set_delay(id(byte), Duration::from_millis(20));
        }

        let results = join_all((0..5).map(|_| h.manager.retrieve(header_request(&h, 3)))).await;

        let expected = Response::Headers(vec![h.headers[3].clone()]);
        assert!(results.iter().all(|r| r.as_ref() == Ok(&expected)));
        assert_eq!(h.network.sent().len(), 1);
        assert_eq!(h.manager.stats().coalesced.load(Ordering::Relaxed), 4);

        // A later identical request starts a fresh retrieval
        h.manager.retrieve(header_request(&h, 3)).await.unwrap();
        assert_eq!(h.network.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_latest_header_is_never_coalesced() {
        let head = build_chain(&genesis_header(), 1, 0).remove(0);
        let answer = head.clone();
        let h = harness(2, 2, ShutdownSignal::never(), move |kind| match kind {
            RequestKind::LatestHeader => Some(Response::Headers(vec![answer.clone()])),
            _ => None,
        });
        let latest = || {
            Request::new(
                RequestKind::LatestHeader,
                LatestHeaderValidator::new(0),
                h.manager.config(),
            )
        };

        let (a, b) = tokio::join!(h.manager.retrieve(latest()), h.manager.retrieve(latest()));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.network.sent().len(), 2);
    }

    struct AcceptAll;

    impl ResponseValidator for AcceptAll {
        fn validate(&self, _: &Response) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_joining_caller_applies_its_own_validator() {
        let h = harness(1, 2, ShutdownSignal::never(), no_extra);
        h.network.set_behavior(id(1), Behavior::Corrupt);
        h.network.set_delay(id(1), Duration::from_millis(20));
        let hash = h.headers[2].hash();
        let kind = RequestKind::HeaderByHash { hash };

        let lenient = Request::new(kind.clone(), AcceptAll, h.manager.config());
        let strict = Request::new(kind, HeaderHashValidator::new(hash), h.manager.config());
        let (first, second) =
            tokio::join!(h.manager.retrieve(lenient), h.manager.retrieve(strict));

        // The forged reply satisfies only the lenient caller
        assert!(first.is_ok());
        assert!(second.is_err());
        assert_eq!(h.manager.stats().coalesced.load(Ordering::Relaxed), 1);
        assert_eq!(h.network.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_header_by_number_is_never_coalesced() {
        let headers = build_chain(&genesis_header(), 3, 0);
        let served = headers[1].clone();
        let h = harness(2, 2, ShutdownSignal::never(), move |kind| match kind {
            RequestKind::HeaderByNumber { number: 2 } => {
                Some(Response::Headers(vec![served.clone()]))
            }
            _ => None,
        });
        let by_number = || {
            Request::new(
                RequestKind::HeaderByNumber { number: 2 },
                HeaderNumberValidator::new(2),
                h.manager.config(),
            )
        };

        let (a, b) = tokio::join!(
            h.manager.retrieve(by_number()),
            h.manager.retrieve(by_number())
        );
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(h.network.sent().len(), 2);
        assert_eq!(h.manager.stats().coalesced.load(Ordering::Relaxed), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_first_caller_does_not_stall_retrieval() {
        let h = harness(1, 2, ShutdownSignal::never(), no_extra);
        h.network.set_behavior(id(1), Behavior::Silent);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            h.manager.retrieve(header_request(&h, 0)),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(h.manager.pending_attempts(), 1);

        // Past the attempt deadline and the wait for an alternate peer
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(h.manager.in_flight(), 0);
        assert_eq!(h.manager.pending_attempts(), 0);
        assert!(h.manager.in_flight.is_empty());
        assert_eq!(h.peers.get(&id(1)).unwrap().outstanding(), 0);
        assert_eq!(h.scorer.outcomes(), vec![(id(1), Outcome::Timeout)]);
    }

    // =========================================================================
    // TEST GROUP 3: Peer churn, unsolicited replies, terminal errors
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_peer_drop_fails_attempt_immediately() {
        let h = harness(2, 2, ShutdownSignal::never(), no_extra);
        h.network.set_behavior(id(1), Behavior::Disconnect);

        let started = Instant::now();
        let request = header_request(&h, 0).with_timeout(Duration::from_secs(10));
        assert!(h.manager.retrieve(request).await.is_ok());

        assert!(started.elapsed() < Duration::from_secs(1));
        // Disconnects are not penalised
        assert_eq!(h.scorer.outcomes(), vec![(id(2), Outcome::Success)]);
    }

    #[tokio::test]
    async fn test_unsolicited_reply_penalised() {
        let h = harness(1, 2, ShutdownSignal::never(), no_extra);
        let delivery = h
            .manager
            .deliver(&id(1), Uuid::new_v4(), Response::Headers(vec![]));
        assert_eq!(delivery, Delivery::Unknown);
        assert_eq!(h.scorer.outcomes(), vec![(id(1), Outcome::Unsolicited)]);
        assert_eq!(h.manager.stats().unsolicited.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_consensus_violation_is_not_retried() {
        let parent = genesis_header();
        let mut bad = build_chain(&parent, 1, 0).remove(0);
        bad.gas_used = bad.gas_limit + 1;
        let served = bad.clone();
        let h = harness(2, 2, ShutdownSignal::never(), move |kind| match kind {
            RequestKind::HeaderByNumber { number: 1 } => {
                Some(Response::Headers(vec![served.clone()]))
            }
            _ => None,
        });

        let verifier = Arc::new(
            HeaderVerifier::new(ConsensusConfig::for_testing(), Arc::new(FakeSeal::accept_all()))
                .with_clock(Arc::new(FixedTimeSource::new(1_700_000_000))),
        );
        let request = Request::new(
            RequestKind::HeaderByNumber { number: 1 },
            HeaderNumberValidator::new(1).with_parent(parent, verifier),
            h.manager.config(),
        );

        let err = h.manager.retrieve(request).await.unwrap_err();
        assert!(matches!(err, RetrievalError::HeaderRejected { .. }));
        assert_eq!(h.network.sent().len(), 1);
        assert_eq!(h.scorer.outcomes(), vec![(id(1), Outcome::InvalidResponse)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_waiting_attempt() {
        let shutdown = Shutdown::new();
        let h = harness(1, 2, shutdown.signal(), no_extra);
        h.network.set_behavior(id(1), Behavior::Silent);

        let request = header_request(&h, 0).with_timeout(Duration::from_secs(60));
        let manager = Arc::clone(&h.manager);
        let task = tokio::spawn(async move { manager.retrieve(request).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        assert!(matches!(
            task.await.unwrap(),
            Err(RetrievalError::Cancelled { .. })
        ));
        assert!(h.scorer.outcomes().is_empty());
    }
}
