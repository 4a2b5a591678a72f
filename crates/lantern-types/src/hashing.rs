//! Keccak-256 helpers.

use sha3::{Digest, Keccak256};

use crate::entities::Hash;

/// Keccak-256 of an arbitrary byte slice.
pub fn keccak256(data: impl AsRef<[u8]>) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data.as_ref());
    hasher.finalize().into()
}

/// Hash two nodes together (`keccak(left || right)`).
pub fn hash_concat(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}
