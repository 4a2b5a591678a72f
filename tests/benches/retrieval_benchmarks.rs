//! # Lantern Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Proofs | CHT proof verification over a full-size section |
//! | Indexer | BloomTrie section leaves for 4096 blocks |
//! | Consensus | Ordered batch header verification |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lantern_consensus::{ConsensusConfig, FakeSeal, HeaderVerifier};
use lantern_types::test_utils::{build_chain, MemoryChain};
use lantern_types::{
    bloom_trie_section_leaves, build_merkle_proof, cht_leaf, cht_section_leaves,
    compute_merkle_root, keccak256, verify_merkle_proof, Bloom, ChainReader, Hash, Shutdown,
};

fn bench_cht_proof(c: &mut Criterion) {
    let mut group = c.benchmark_group("cht-proof");
    for size in [4_096u64, 32_768] {
        let blocks: Vec<(u64, Hash)> = (0..size)
            .map(|n| (n, keccak256(n.to_be_bytes())))
            .collect();
        let leaves = cht_section_leaves([0; 32], &blocks);
        let root = compute_merkle_root(&leaves);
        let index = size as usize / 2;
        let proof = build_merkle_proof(&leaves, 1 + index).unwrap_or_default();
        let leaf = cht_leaf(blocks[index].0, &blocks[index].1);

        group.bench_with_input(BenchmarkId::new("verify", size), &size, |b, _| {
            b.iter(|| black_box(verify_merkle_proof(&leaf, &proof, &root)))
        });
    }
    group.finish();
}

fn bench_bloom_trie_leaves(c: &mut Criterion) {
    let mut group = c.benchmark_group("bloom-trie");
    group.measurement_time(Duration::from_secs(10));

    let blooms: Vec<Bloom> = (0..4_096u64)
        .map(|n| {
            let mut bloom = Bloom::default();
            bloom.accrue(&n.to_be_bytes());
            bloom
        })
        .collect();
    group.throughput(Throughput::Elements(blooms.len() as u64));
    group.bench_function("section_leaves_4096", |b| {
        b.iter(|| black_box(bloom_trie_section_leaves([0; 32], &blooms, 4_096)))
    });
    group.finish();
}

fn bench_batch_verification(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify-headers");
    let chain = Arc::new(MemoryChain::with_length(1));
    let verifier = Arc::new(HeaderVerifier::new(
        ConsensusConfig::default(),
        Arc::new(FakeSeal::accept_all()),
    ));

    for count in [16usize, 256] {
        let headers = build_chain(&chain.current_header(), count, 1);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("ordered", count), &headers, |b, headers| {
            b.iter(|| {
                let results = verifier
                    .verify_headers(
                        chain.clone(),
                        headers.clone(),
                        Vec::new(),
                        Shutdown::new().signal(),
                    )
                    .results();
                black_box(results)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_cht_proof,
    bench_bloom_trie_leaves,
    bench_batch_verification
);
criterion_main!(benches);
