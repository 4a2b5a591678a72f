//! # Checkpoint Sections
//!
//! Leaf layouts shared by the indexers that build section roots and the
//! validators that check peer proofs against them.
//!
//! A CHT section tree has `section_size + 1` leaves: the previous section's
//! root followed by `keccak(number_be || hash)` for each block. A BloomTrie
//! section tree has `BLOOM_BITS + 1` leaves: the previous root followed by
//! `keccak(bit_be || bits)` where `bits` packs that bloom bit across every
//! block of the section.

use crate::entities::{Bloom, Hash, BLOOM_BITS};
use crate::hashing::keccak256;

/// Trusted section roots, as sealed by a local indexer.
pub trait CheckpointRoots: Send + Sync {
    /// Blocks per section.
    fn section_size(&self) -> u64;

    /// Number of sealed sections.
    fn section_count(&self) -> u64;

    /// Root of a sealed section.
    fn section_root(&self, index: u64) -> Option<Hash>;
}

/// CHT leaf for a canonical block.
pub fn cht_leaf(number: u64, hash: &Hash) -> Hash {
    let mut buf = [0u8; 40];
    buf[..8].copy_from_slice(&number.to_be_bytes());
    buf[8..].copy_from_slice(hash);
    keccak256(buf)
}

/// BloomTrie leaf for one bloom bit across a section.
pub fn bloom_trie_leaf(bit: u32, bits: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(4 + bits.len());
    buf.extend_from_slice(&bit.to_be_bytes());
    buf.extend_from_slice(bits);
    keccak256(buf)
}

/// Leaf of a state proof: the key and value are both committed.
pub fn state_leaf(key: &Hash, value: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(32 + value.len());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    keccak256(buf)
}

/// Bytes needed to pack one bit per block of a section.
pub fn packed_len(section_size: u64) -> usize {
    ((section_size + 7) / 8) as usize
}

/// Pack bloom bit `bit` of every bloom (one per block, in order).
pub fn pack_bloom_bit<'a>(blooms: impl IntoIterator<Item = &'a Bloom>, bit: usize, len: usize) -> Vec<u8> {
    let mut packed = vec![0u8; len];
    for (i, bloom) in blooms.into_iter().enumerate() {
        if bit < BLOOM_BITS && bloom.bit(bit) && i / 8 < len {
            packed[i / 8] |= 0x80 >> (i % 8);
        }
    }
    packed
}

/// All leaves of a CHT section: `prev_root`, then one leaf per block.
pub fn cht_section_leaves(prev_root: Hash, blocks: &[(u64, Hash)]) -> Vec<Hash> {
    std::iter::once(prev_root)
        .chain(blocks.iter().map(|(number, hash)| cht_leaf(*number, hash)))
        .collect()
}

/// All leaves of a BloomTrie section: `prev_root`, then one leaf per bloom
/// bit packing that bit across the section's blocks.
pub fn bloom_trie_section_leaves(prev_root: Hash, blooms: &[Bloom], section_size: u64) -> Vec<Hash> {
    let len = packed_len(section_size);
    std::iter::once(prev_root)
        .chain((0..BLOOM_BITS).map(|bit| {
            let bits = pack_bloom_bit(blooms.iter(), bit, len);
            bloom_trie_leaf(bit as u32, &bits)
        }))
        .collect()
}
