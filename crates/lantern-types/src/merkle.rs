//! # Merkle Proofs
//!
//! Binary Keccak Merkle trees used for transaction roots, receipt roots and
//! the CHT / BloomTrie section commitments.
//!
//! Odd levels duplicate their last node. Proof nodes record which side the
//! sibling sits on, so the path also encodes the leaf index (see
//! [`proof_index`]).

use serde::{Deserialize, Serialize};

use crate::entities::{Hash, EMPTY_HASH};
use crate::hashing::hash_concat;

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Position {
    /// Sibling is the left child; the running hash is the right child.
    Left,
    /// Sibling is the right child; the running hash is the left child.
    Right,
}

/// One step of a Merkle path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofNode {
    /// Sibling hash.
    pub hash: Hash,
    /// Side of the sibling.
    pub position: Position,
}

impl ProofNode {
    /// Sibling on the left.
    pub fn left(hash: Hash) -> Self {
        Self {
            hash,
            position: Position::Left,
        }
    }

    /// Sibling on the right.
    pub fn right(hash: Hash) -> Self {
        Self {
            hash,
            position: Position::Right,
        }
    }
}

/// Errors building proofs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MerkleError {
    /// Requested leaf index is outside the tree.
    #[error("leaf index {index} out of range for {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Fold a proof path from `leaf` and compare against `expected_root`.
///
/// An empty path is valid only when the leaf is the root.
pub fn verify_merkle_proof(leaf: &Hash, proof_path: &[ProofNode], expected_root: &Hash) -> bool {
    let mut current = *leaf;
    for node in proof_path {
        current = match node.position {
            Position::Left => hash_concat(&node.hash, &current),
            Position::Right => hash_concat(&current, &node.hash),
        };
    }
    current == *expected_root
}

/// Leaf index implied by a proof path.
///
/// Level `k` contributes bit `k` when the running hash was the right child.
/// Returns `None` for paths deeper than `usize` can index.
pub fn proof_index(proof_path: &[ProofNode]) -> Option<usize> {
    if proof_path.len() >= usize::BITS as usize {
        return None;
    }
    Some(
        proof_path
            .iter()
            .enumerate()
            .filter(|(_, node)| node.position == Position::Left)
            .fold(0usize, |acc, (level, _)| acc | (1 << level)),
    )
}

/// Number of levels in a tree over `leaf_count` leaves.
pub fn tree_depth(leaf_count: usize) -> usize {
    let mut depth = 0;
    let mut width = leaf_count;
    while width > 1 {
        width = (width + 1) / 2;
        depth += 1;
    }
    depth
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|chunk| {
            let left = &chunk[0];
            let right = chunk.get(1).unwrap_or(left);
            hash_concat(left, right)
        })
        .collect()
}

/// Root over `leaves`. The empty tree has the zero root.
pub fn compute_merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return EMPTY_HASH;
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Build the proof path for `leaves[index]`.
pub fn build_merkle_proof(leaves: &[Hash], index: usize) -> Result<Vec<ProofNode>, MerkleError> {
    if index >= leaves.len() {
        return Err(MerkleError::IndexOutOfRange {
            index,
            len: leaves.len(),
        });
    }

    let mut proof = Vec::with_capacity(tree_depth(leaves.len()));
    let mut level = leaves.to_vec();
    let mut index = index;

    while level.len() > 1 {
        if index % 2 == 1 {
            proof.push(ProofNode::left(level[index - 1]));
        } else {
            // Unpaired last node hashes with itself
            let sibling = level.get(index + 1).copied().unwrap_or(level[index]);
            proof.push(ProofNode::right(sibling));
        }
        level = next_level(&level);
        index /= 2;
    }

    Ok(proof)
}
