//! Shared fixtures: a remote chain served by simulated peers and a node
//! that knows only its genesis.

use std::collections::HashMap;
use std::sync::Arc;

use lantern_consensus::FakeSeal;
use lantern_node::{LightNode, NodeConfig};
use lantern_peers::test_utils::{peer_info, ScriptedDialer};
use lantern_retrieval::test_utils::SimNetwork;
use lantern_types::test_utils::{build_chain, genesis_header, MemoryChain};
use lantern_types::{Hash, Header, NodeId, RequestKind, Response};

pub fn id(byte: u8) -> NodeId {
    peer_info(byte, 0).id
}

pub struct Fixture {
    pub node: Arc<LightNode>,
    pub network: Arc<SimNetwork>,
    pub chain: Arc<MemoryChain>,
    /// Headers 1..=64 of the chain the peers serve.
    pub remote: Vec<Header>,
}

impl Fixture {
    /// Node over a local chain of genesis only, with `peers` honest peers at
    /// head 64, each accepting `ceiling` outstanding requests.
    pub fn new(peers: u8, ceiling: usize, configure: impl FnOnce(&mut NodeConfig)) -> Self {
        let remote = build_chain(&genesis_header(), 64, 0);
        let by_hash: HashMap<Hash, Header> =
            remote.iter().map(|h| (h.hash(), h.clone())).collect();
        let by_number = remote.clone();

        let network = SimNetwork::new(move |kind| match kind {
            RequestKind::HeaderByHash { hash } => {
                by_hash.get(hash).map(|h| Response::Headers(vec![h.clone()]))
            }
            RequestKind::HeaderByNumber { number } => by_number
                .iter()
                .find(|h| h.number == *number)
                .map(|h| Response::Headers(vec![h.clone()])),
            RequestKind::LatestHeader => by_number.last().map(|h| Response::Headers(vec![h.clone()])),
            _ => None,
        });

        let mut config = NodeConfig::for_testing();
        config.peers.max_outstanding = ceiling;
        configure(&mut config);

        let chain = Arc::new(MemoryChain::new(genesis_header()));
        let node = Arc::new(
            LightNode::open_with_seal(
                config,
                chain.clone(),
                network.clone(),
                Arc::new(ScriptedDialer::new()),
                Arc::new(FakeSeal::accept_all()),
            )
            .unwrap(),
        );
        network.attach(node.manager());
        for byte in 1..=peers {
            node.peers().register(peer_info(byte, 64)).unwrap();
        }

        Self {
            node,
            network,
            chain,
            remote,
        }
    }
}
