//! # Lantern Types
//!
//! Cross-crate types for the light client retrieval layer.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: headers, receipts, bodies and peer identities
//!   are defined once here and shared by every subsystem.
//! - **Pure Primitives**: hashing and Merkle proof checks are pure functions;
//!   nothing in this crate performs I/O.
//! - **Ports, not globals**: the canonical chain is reached through the
//!   [`ChainReader`] trait and shutdown through [`ShutdownSignal`].

pub mod chain;
pub mod checkpoint;
pub mod entities;
pub mod hashing;
pub mod merkle;
pub mod messages;
pub mod shutdown;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use chain::{ChainEvent, ChainReader};
pub use checkpoint::{
    bloom_trie_leaf, bloom_trie_section_leaves, cht_leaf, cht_section_leaves, pack_bloom_bit,
    packed_len, state_leaf, CheckpointRoots,
};
pub use entities::*;
pub use hashing::{hash_concat, keccak256};
pub use merkle::{
    build_merkle_proof, compute_merkle_root, proof_index, tree_depth, verify_merkle_proof,
    MerkleError, Position, ProofNode,
};
pub use messages::{RequestClass, RequestId, RequestKind, Response};
pub use shutdown::{Shutdown, ShutdownSignal};
