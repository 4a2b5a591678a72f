//! Checkpoint sections across reorgs and restarts.

use std::sync::Arc;
use std::time::Duration;

use lantern_indexer::ChtIndexer;
use lantern_node::{LightNode, NodeConfig, StorageKind};
use lantern_peers::test_utils::{RecordingTransport, ScriptedDialer};
use lantern_types::test_utils::{build_chain, MemoryChain};
use lantern_types::{cht_section_leaves, compute_merkle_root, ChainReader, Hash};

fn open(config: &NodeConfig, chain: &Arc<MemoryChain>) -> LightNode {
    LightNode::open(
        config.clone(),
        chain.clone(),
        Arc::new(RecordingTransport::new()),
        Arc::new(ScriptedDialer::new()),
    )
    .unwrap()
}

async fn wait_for_sections(node: &LightNode, count: u64) {
    for _ in 0..300 {
        if node.status().cht_sections >= count && node.status().bloom_sections >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("indexers stuck at {:?}", node.status());
}

fn expected_cht_root(chain: &MemoryChain, section: u64, size: u64, prev: Hash) -> Hash {
    let blocks: Vec<(u64, Hash)> = (section * size..(section + 1) * size)
        .map(|n| (n, chain.get_header_by_number(n).unwrap().hash()))
        .collect();
    compute_merkle_root(&cht_section_leaves(prev, &blocks))
}

#[tokio::test]
async fn test_reorg_in_open_section_then_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = NodeConfig::for_testing();
    config.storage.backend = StorageKind::Rocksdb;
    config.storage.data_dir = dir.path().join("db");
    let size = config.indexer.section_size;

    // Head 20 with two confirmations seals sections 0 and 1
    let chain = Arc::new(MemoryChain::with_length(20));
    let sealed: Vec<Hash> = {
        let node = open(&config, &chain);
        node.start();
        wait_for_sections(&node, 2).await;
        assert_eq!(node.status().cht_sections, 2);

        // Fork inside the open third section
        let fork_point = chain.get_header_by_number(17).unwrap();
        let fork = build_chain(&fork_point, 5, 9);
        for header in &fork[..4] {
            chain.insert_side(header.clone());
        }
        chain.insert_canonical(fork[4].clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(node.status().cht_sections, 2);

        let roots = (0..2).map(|i| node.cht().section_root(i).unwrap()).collect();
        node.stop().await;
        roots
    };

    // Restart resumes from the persisted sections and seals the fork
    chain.extend(build_chain(&chain.current_header(), 3, 9));
    let node = open(&config, &chain);
    assert_eq!(node.status().cht_sections, 2);
    node.start();
    wait_for_sections(&node, 3).await;

    assert_eq!(node.cht().section_root(0), Some(sealed[0]));
    assert_eq!(node.cht().section_root(1), Some(sealed[1]));
    assert_eq!(
        node.cht().section_root(2),
        Some(expected_cht_root(&chain, 2, size, sealed[1]))
    );
    let meta = node.cht().section(2).unwrap();
    assert_eq!(meta.head_hash, chain.get_header_by_number(23).unwrap().hash());
    node.stop().await;
    drop(node);

    // A standalone indexer over the same database sees the same sections
    let store = lantern_storage::open_store(&config.storage.backend()).unwrap();
    let reader: Arc<dyn ChainReader> = chain.clone();
    let cht = ChtIndexer::cht(reader, store, &config.indexer).unwrap();
    assert_eq!(cht.section_count(), 3);
    assert_eq!(cht.section_root(1), Some(sealed[1]));
    assert_eq!(cht.section(2), Some(meta));
}
