//! State access needed by block finalisation.

use std::collections::BTreeMap;

use lantern_types::{compute_merkle_root, keccak256, Address, Hash, U256};

/// Mutable account state.
pub trait StateDb {
    /// Credit `amount` to `address`.
    fn add_balance(&mut self, address: &Address, amount: U256);

    /// Current balance of `address`.
    fn balance(&self, address: &Address) -> U256;

    /// Root committing to every pending change.
    fn intermediate_root(&mut self) -> Hash;
}

/// Balances held in memory; the root is a Merkle tree over sorted
/// `keccak(address || balance)` leaves.
#[derive(Debug, Default, Clone)]
pub struct InMemoryState {
    balances: BTreeMap<Address, U256>,
}

impl InMemoryState {
    /// Empty state.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateDb for InMemoryState {
    fn add_balance(&mut self, address: &Address, amount: U256) {
        let entry = self.balances.entry(*address).or_insert_with(U256::zero);
        *entry = entry.saturating_add(amount);
    }

    fn balance(&self, address: &Address) -> U256 {
        self.balances.get(address).copied().unwrap_or_default()
    }

    fn intermediate_root(&mut self) -> Hash {
        let leaves: Vec<Hash> = self
            .balances
            .iter()
            .map(|(address, balance)| {
                let mut buf = [0u8; 52];
                buf[..20].copy_from_slice(address);
                balance.to_big_endian(&mut buf[20..]);
                keccak256(buf)
            })
            .collect();
        compute_merkle_root(&leaves)
    }
}
