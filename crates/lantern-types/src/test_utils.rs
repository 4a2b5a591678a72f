//! In-memory canonical chain and header builders shared by tests across the
//! workspace. Enabled with the `test-utils` feature.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::chain::{ChainEvent, ChainReader};
use crate::entities::{Hash, Header, U256};

/// Gas limit used by generated headers.
pub const TEST_GAS_LIMIT: u64 = 8_000_000;

/// Genesis header for test chains.
pub fn genesis_header() -> Header {
    Header {
        number: 0,
        gas_limit: TEST_GAS_LIMIT,
        time: 1_600_000_000,
        difficulty: U256::from(1u64),
        extra: b"genesis".to_vec(),
        ..Default::default()
    }
}

/// A valid child of `parent`. `salt` lands in extra-data so forks differ.
pub fn child_of(parent: &Header, salt: u8) -> Header {
    Header {
        parent_hash: parent.hash(),
        number: parent.number + 1,
        gas_limit: parent.gas_limit,
        gas_used: parent.gas_limit / 2,
        time: parent.time + 10,
        difficulty: parent.difficulty,
        extra: vec![salt],
        coinbase: [salt; 20],
        ..Default::default()
    }
}

/// `count` linked headers on top of `parent`.
pub fn build_chain(parent: &Header, count: usize, salt: u8) -> Vec<Header> {
    let mut out = Vec::with_capacity(count);
    let mut tip = parent.clone();
    for _ in 0..count {
        let next = child_of(&tip, salt);
        out.push(next.clone());
        tip = next;
    }
    out
}

struct ChainState {
    headers: HashMap<Hash, Header>,
    canonical: BTreeMap<u64, Hash>,
    head: Header,
}

/// Canonical header chain held in memory.
pub struct MemoryChain {
    state: RwLock<ChainState>,
    events: broadcast::Sender<ChainEvent>,
}

impl MemoryChain {
    /// Chain containing only `genesis`.
    pub fn new(genesis: Header) -> Self {
        let hash = genesis.hash();
        let mut headers = HashMap::new();
        headers.insert(hash, genesis.clone());
        let mut canonical = BTreeMap::new();
        canonical.insert(genesis.number, hash);
        let (events, _) = broadcast::channel(4096);
        Self {
            state: RwLock::new(ChainState {
                headers,
                canonical,
                head: genesis,
            }),
            events,
        }
    }

    /// Chain with a generated genesis and `length` canonical blocks after it.
    pub fn with_length(length: usize) -> Self {
        let genesis = genesis_header();
        let chain = Self::new(genesis.clone());
        chain.extend(build_chain(&genesis, length, 0));
        chain
    }

    /// Store a header without making it canonical.
    pub fn insert_side(&self, header: Header) {
        self.state.write().headers.insert(header.hash(), header);
    }

    /// Make `header` the new head, rewriting the canonical index along its
    /// ancestry (a reorg when it does not extend the old head).
    pub fn insert_canonical(&self, header: Header) {
        {
            let mut state = self.state.write();
            let hash = header.hash();
            state.headers.insert(hash, header.clone());
            let stale: Vec<u64> = state
                .canonical
                .range(header.number..)
                .map(|(n, _)| *n)
                .collect();
            for number in stale {
                state.canonical.remove(&number);
            }
            state.canonical.insert(header.number, hash);

            let mut cursor = header.clone();
            while cursor.number > 0 {
                let parent_number = cursor.number - 1;
                if state.canonical.get(&parent_number) == Some(&cursor.parent_hash) {
                    break;
                }
                let Some(parent) = state.headers.get(&cursor.parent_hash).cloned() else {
                    break;
                };
                state.canonical.insert(parent_number, cursor.parent_hash);
                cursor = parent;
            }
            state.head = header.clone();
        }
        let _ = self.events.send(ChainEvent::Head(header));
    }

    /// Append headers as successive heads.
    pub fn extend(&self, headers: impl IntoIterator<Item = Header>) {
        for header in headers {
            self.insert_canonical(header);
        }
    }
}

impl ChainReader for MemoryChain {
    fn current_header(&self) -> Header {
        self.state.read().head.clone()
    }

    fn get_header(&self, hash: &Hash, number: u64) -> Option<Header> {
        self.state
            .read()
            .headers
            .get(hash)
            .filter(|h| h.number == number)
            .cloned()
    }

    fn get_header_by_number(&self, number: u64) -> Option<Header> {
        let state = self.state.read();
        let hash = state.canonical.get(&number)?;
        state.headers.get(hash).cloned()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }
}
