//! # Indexer Backends
//!
//! A backend accumulates one section's worth of canonical headers and
//! produces the section root. The driving [`ChainIndexer`] decides which
//! headers to feed and when a section is complete.
//!
//! [`ChainIndexer`]: crate::ChainIndexer

use lantern_types::{
    bloom_trie_section_leaves, cht_section_leaves, compute_merkle_root, Bloom, Hash, Header,
};

/// Per-section accumulator.
pub trait IndexerBackend: Send {
    /// Short name for logs.
    const NAME: &'static str;

    /// Key prefix of this indexer's sealed sections.
    const SECTION_PREFIX: &'static [u8];

    /// Blocks per section.
    fn section_size(&self) -> u64;

    /// Begin section `section`, chained onto `prev_root`. Discards any
    /// accumulated headers.
    fn reset(&mut self, section: u64, prev_root: Hash);

    /// Add the next canonical header of the current section.
    fn process(&mut self, header: &Header);

    /// Root of the completed section.
    fn commit(&mut self) -> Hash;
}

/// Canonical Hash Trie: commits to `(number, hash)` of every block.
#[derive(Debug)]
pub struct ChtBackend {
    section_size: u64,
    prev_root: Hash,
    blocks: Vec<(u64, Hash)>,
}

impl ChtBackend {
    /// Backend with `section_size` blocks per section.
    pub fn new(section_size: u64) -> Self {
        Self {
            section_size,
            prev_root: Hash::default(),
            blocks: Vec::with_capacity(section_size as usize),
        }
    }
}

impl IndexerBackend for ChtBackend {
    const NAME: &'static str = "cht";
    const SECTION_PREFIX: &'static [u8] = b"lantern/cht/section/";

    fn section_size(&self) -> u64 {
        self.section_size
    }

    fn reset(&mut self, _section: u64, prev_root: Hash) {
        self.prev_root = prev_root;
        self.blocks.clear();
    }

    fn process(&mut self, header: &Header) {
        self.blocks.push((header.number, header.hash()));
    }

    fn commit(&mut self) -> Hash {
        compute_merkle_root(&cht_section_leaves(self.prev_root, &self.blocks))
    }
}

/// BloomTrie: commits to every bloom bit across the section's blocks.
#[derive(Debug)]
pub struct BloomTrieBackend {
    section_size: u64,
    prev_root: Hash,
    blooms: Vec<Bloom>,
}

impl BloomTrieBackend {
    /// Backend with `section_size` blocks per section.
    pub fn new(section_size: u64) -> Self {
        Self {
            section_size,
            prev_root: Hash::default(),
            blooms: Vec::with_capacity(section_size as usize),
        }
    }
}

impl IndexerBackend for BloomTrieBackend {
    const NAME: &'static str = "bloomtrie";
    const SECTION_PREFIX: &'static [u8] = b"lantern/bloomtrie/section/";

    fn section_size(&self) -> u64 {
        self.section_size
    }

    fn reset(&mut self, _section: u64, prev_root: Hash) {
        self.prev_root = prev_root;
        self.blooms.clear();
    }

    fn process(&mut self, header: &Header) {
        self.blooms.push(header.bloom);
    }

    fn commit(&mut self) -> Hash {
        compute_merkle_root(&bloom_trie_section_leaves(
            self.prev_root,
            &self.blooms,
            self.section_size,
        ))
    }
}
