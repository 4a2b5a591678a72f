//! # Light Node
//!
//! Builds every component from one [`NodeConfig`], runs the background tasks
//! (dial loop, CHT and BloomTrie indexers) and shuts them down cleanly.
//!
//! ## Startup
//!
//! 1. Validate configuration
//! 2. Open the store and load reputation
//! 3. Build peer set, server pool and retrieval manager
//! 4. Open both indexers, resuming from persisted sections
//! 5. [`LightNode::start`] spawns the background tasks

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::join_all;
use lantern_consensus::{BatchVerification, HashSeal, HeaderVerifier, SealEngine};
use lantern_indexer::{BloomTrieIndexer, ChainIndexer, ChtIndexer};
use lantern_peers::{Dialer, PeerSet, PeerTransport, ReputationTable, ServerPool};
use lantern_retrieval::{Delivery, LightOdr, Request, RetrievalError, RetrieveManager};
use lantern_storage::{open_store, KeyValueStore};
use lantern_types::{
    ChainReader, Header, NodeId, RequestId, Response, Shutdown, ShutdownSignal,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::NodeConfig;

/// Upper bound on waiting for background tasks during [`LightNode::stop`].
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Point-in-time view for an API layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Local head number.
    pub head: u64,
    /// Registered serving peers.
    pub connected_peers: usize,
    /// Known dial candidates.
    pub candidate_peers: usize,
    /// Sealed CHT sections.
    pub cht_sections: u64,
    /// Sealed BloomTrie sections.
    pub bloom_sections: u64,
    /// Logical retrievals in progress.
    pub in_flight_requests: usize,
}

/// A wired light node.
pub struct LightNode {
    config: NodeConfig,
    store: Arc<dyn KeyValueStore>,
    chain: Arc<dyn ChainReader>,
    peers: Arc<PeerSet>,
    pool: Arc<ServerPool>,
    manager: Arc<RetrieveManager>,
    verifier: Arc<HeaderVerifier>,
    cht: Arc<ChtIndexer>,
    bloom_trie: Arc<BloomTrieIndexer>,
    odr: LightOdr,
    shutdown: Shutdown,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LightNode {
    /// Wire a node whose headers are sealed with [`HashSeal`].
    pub fn open(
        config: NodeConfig,
        chain: Arc<dyn ChainReader>,
        transport: Arc<dyn PeerTransport>,
        dialer: Arc<dyn Dialer>,
    ) -> Result<Self> {
        Self::open_with_seal(config, chain, transport, dialer, Arc::new(HashSeal))
    }

    /// Wire a node with a specific seal engine.
    pub fn open_with_seal(
        config: NodeConfig,
        chain: Arc<dyn ChainReader>,
        transport: Arc<dyn PeerTransport>,
        dialer: Arc<dyn Dialer>,
        seal: Arc<dyn SealEngine>,
    ) -> Result<Self> {
        config.validate().context("invalid node configuration")?;

        let store = open_store(&config.storage.backend())
            .with_context(|| format!("failed to open {:?} store", config.storage.backend))?;
        let reputation = Arc::new(
            ReputationTable::load(Arc::clone(&store), config.reputation.clone())
                .context("failed to load reputation records")?,
        );

        let shutdown = Shutdown::new();
        let peers = Arc::new(PeerSet::new(config.peers.clone()));
        let pool = Arc::new(
            ServerPool::new(
                config.pool.clone(),
                Arc::clone(&peers),
                reputation,
                dialer,
                Arc::clone(&transport),
            )
            .context("failed to create server pool")?,
        );
        let manager = Arc::new(RetrieveManager::new(
            config.retrieval.clone(),
            Arc::clone(&peers),
            transport,
            pool.clone(),
            shutdown.signal(),
        ));

        let verifier = Arc::new(HeaderVerifier::new(config.consensus.clone(), seal));
        let cht = Arc::new(
            ChainIndexer::cht(Arc::clone(&chain), Arc::clone(&store), &config.indexer)
                .context("failed to open CHT indexer")?,
        );
        let bloom_trie = Arc::new(
            ChainIndexer::bloom_trie(Arc::clone(&chain), Arc::clone(&store), &config.indexer)
                .context("failed to open BloomTrie indexer")?,
        );

        let odr = LightOdr::new(Arc::clone(&manager), Arc::clone(&chain), Arc::clone(&verifier))
            .with_cht(cht.clone())
            .with_bloom_trie(bloom_trie.clone());

        info!(
            head = chain.current_header().number,
            cht_sections = cht.section_count(),
            bloom_sections = bloom_trie.section_count(),
            candidates = pool.candidate_count(),
            "Light node opened"
        );

        Ok(Self {
            config,
            store,
            chain,
            peers,
            pool,
            manager,
            verifier,
            cht,
            bloom_trie,
            odr,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the dial loop and both indexers. Must run inside a Tokio
    /// runtime; later calls do nothing.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock();
        if !tasks.is_empty() || self.shutdown.is_triggered() {
            return;
        }
        tasks.push(tokio::spawn(Arc::clone(&self.pool).run(self.shutdown.signal())));
        tasks.push(tokio::spawn(Arc::clone(&self.cht).run(self.shutdown.signal())));
        tasks.push(tokio::spawn(
            Arc::clone(&self.bloom_trie).run(self.shutdown.signal()),
        ));
        info!(tasks = tasks.len(), "Light node started");
    }

    /// Fetch and validate through the retrieval manager.
    pub async fn retrieve(&self, request: Request) -> Result<Response, RetrievalError> {
        self.manager.retrieve(request).await
    }

    /// Entry point for replies from the transport.
    pub fn deliver(&self, peer: &NodeId, request_id: RequestId, response: Response) -> Delivery {
        self.manager.deliver(peer, request_id, response)
    }

    /// Verify a header sequence against the local chain, results in order.
    pub fn verify_headers(&self, headers: Vec<Header>, seals: Vec<bool>) -> BatchVerification {
        self.verifier.verify_headers(
            Arc::clone(&self.chain),
            headers,
            seals,
            self.shutdown.signal(),
        )
    }

    /// Typed retrievals.
    pub fn odr(&self) -> &LightOdr {
        &self.odr
    }

    /// The retrieval manager.
    pub fn manager(&self) -> &Arc<RetrieveManager> {
        &self.manager
    }

    /// Connected serving peers.
    pub fn peers(&self) -> &Arc<PeerSet> {
        &self.peers
    }

    /// Dialing and reputation.
    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Header verification.
    pub fn verifier(&self) -> &Arc<HeaderVerifier> {
        &self.verifier
    }

    /// Canonical Hash Trie sections.
    pub fn cht(&self) -> &Arc<ChtIndexer> {
        &self.cht
    }

    /// BloomTrie sections.
    pub fn bloom_trie(&self) -> &Arc<BloomTrieIndexer> {
        &self.bloom_trie
    }

    /// Effective configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Fires once [`LightNode::stop`] begins.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Current counters.
    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            head: self.chain.current_header().number,
            connected_peers: self.peers.len(),
            candidate_peers: self.pool.candidate_count(),
            cht_sections: self.cht.section_count(),
            bloom_sections: self.bloom_trie.section_count(),
            in_flight_requests: self.manager.in_flight(),
        }
    }

    /// Cancel outstanding work, wait for background tasks, flush the store.
    pub async fn stop(&self) {
        if self.shutdown.is_triggered() {
            return;
        }
        info!("Stopping light node");
        self.shutdown.trigger();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        if tokio::time::timeout(STOP_TIMEOUT, join_all(tasks)).await.is_err() {
            warn!(timeout_secs = STOP_TIMEOUT.as_secs(), "Background tasks did not stop in time");
        }

        if let Err(e) = self.pool.reputation().flush() {
            warn!(error = %e, "Failed to flush reputation records");
        }
        if let Err(e) = self.store.flush() {
            warn!(error = %e, "Failed to flush store");
        }
        self.manager.log_summary();
        info!("Light node stopped");
    }
}
