//! # Core Chain Entities
//!
//! Headers, bodies, receipts and identities exchanged with serving peers.
//!
//! ## Clusters
//!
//! - **Chain**: `Header`, `BlockBody`, `Block`, `Receipt`, `Log`, `Bloom`
//! - **State**: `Account`
//! - **Networking**: `NodeId`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha3::{Digest, Keccak256};

use crate::merkle::compute_merkle_root;

// Re-export U256 from primitive-types for use across all subsystems
pub use primitive_types::U256;

/// A 32-byte Keccak-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte account address.
pub type Address = [u8; 20];

/// Zero hash, used as the "no parent" marker and empty-root value.
pub const EMPTY_HASH: Hash = [0u8; 32];

/// Number of bytes in a log bloom.
pub const BLOOM_BYTES: usize = 256;

/// Number of addressable bits in a log bloom.
pub const BLOOM_BITS: usize = BLOOM_BYTES * 8;

// =============================================================================
// NETWORKING
// =============================================================================

/// Stable identity of a remote node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 32]);

impl NodeId {
    /// Create a node id from raw bytes.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}..)", &hex::encode(&self.0[..4]))
    }
}

/// Failure parsing a hex node id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseNodeIdError {
    /// Not valid hex.
    #[error("invalid hex in node id: {0}")]
    InvalidHex(String),
    /// Wrong number of bytes.
    #[error("node id must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for NodeId {
    type Err = ParseNodeIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|e| ParseNodeIdError::InvalidHex(e.to_string()))?;
        let array: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| ParseNodeIdError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

// =============================================================================
// LOG BLOOM
// =============================================================================

/// 2048-bit log bloom filter (three bits set per accrued input).
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bloom(#[serde_as(as = "Bytes")] pub [u8; BLOOM_BYTES]);

impl Default for Bloom {
    fn default() -> Self {
        Self([0u8; BLOOM_BYTES])
    }
}

impl fmt::Debug for Bloom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set = (0..BLOOM_BITS).filter(|i| self.bit(*i)).count();
        write!(f, "Bloom({set} bits set)")
    }
}

impl Bloom {
    /// The three bit positions an input maps to.
    fn positions(input: &[u8]) -> [usize; 3] {
        let digest = Keccak256::digest(input);
        let mut out = [0usize; 3];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = ((usize::from(digest[2 * i]) << 8) | usize::from(digest[2 * i + 1]))
                & (BLOOM_BITS - 1);
        }
        out
    }

    fn locate(index: usize) -> (usize, u8) {
        (BLOOM_BYTES - 1 - index / 8, 1u8 << (index % 8))
    }

    /// Add an input (address or topic) to the bloom.
    pub fn accrue(&mut self, input: &[u8]) {
        for index in Self::positions(input) {
            let (byte, mask) = Self::locate(index);
            self.0[byte] |= mask;
        }
    }

    /// OR another bloom into this one.
    pub fn accrue_bloom(&mut self, other: &Bloom) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a |= *b;
        }
    }

    /// Whether the input may be contained (false positives possible).
    pub fn contains(&self, input: &[u8]) -> bool {
        Self::positions(input).into_iter().all(|index| self.bit(index))
    }

    /// Read a single bit (0..2048).
    pub fn bit(&self, index: usize) -> bool {
        if index >= BLOOM_BITS {
            return false;
        }
        let (byte, mask) = Self::locate(index);
        self.0[byte] & mask != 0
    }
}

// =============================================================================
// CHAIN
// =============================================================================

/// Block header as served by remote peers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Hash of the parent header.
    pub parent_hash: Hash,
    /// Beneficiary of the block reward.
    pub coinbase: Address,
    /// State root after applying the block.
    pub state_root: Hash,
    /// Merkle root of the block's transactions.
    pub tx_root: Hash,
    /// Merkle root of the block's receipts.
    pub receipt_root: Hash,
    /// Union of all receipt blooms.
    pub bloom: Bloom,
    /// Difficulty target for the seal.
    pub difficulty: U256,
    /// Block number.
    pub number: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Gas consumed by the block's transactions.
    pub gas_used: u64,
    /// Unix timestamp (seconds).
    pub time: u64,
    /// Free-form extra data.
    pub extra: Vec<u8>,
    /// Seal mix digest.
    pub mix_digest: Hash,
    /// Seal nonce.
    pub nonce: u64,
}

impl Header {
    fn hash_fields(&self, hasher: &mut Keccak256) {
        hasher.update(self.parent_hash);
        hasher.update(self.coinbase);
        hasher.update(self.state_root);
        hasher.update(self.tx_root);
        hasher.update(self.receipt_root);
        hasher.update(self.bloom.0);
        let mut difficulty = [0u8; 32];
        self.difficulty.to_big_endian(&mut difficulty);
        hasher.update(difficulty);
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.gas_limit.to_be_bytes());
        hasher.update(self.gas_used.to_be_bytes());
        hasher.update(self.time.to_be_bytes());
        hasher.update((self.extra.len() as u64).to_be_bytes());
        hasher.update(&self.extra);
    }

    /// Header hash, covering every field including the seal.
    pub fn hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        self.hash_fields(&mut hasher);
        hasher.update(self.mix_digest);
        hasher.update(self.nonce.to_be_bytes());
        hasher.finalize().into()
    }

    /// Hash of the header without its seal fields (the seal commits to this).
    pub fn seal_hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        self.hash_fields(&mut hasher);
        hasher.finalize().into()
    }
}

/// An emitted contract log.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Opaque payload.
    pub data: Vec<u8>,
}

/// Transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Receipt {
    /// 1 on success, 0 on failure.
    pub status: u8,
    /// Cumulative gas used in the block up to and including this transaction.
    pub cumulative_gas_used: u64,
    /// Bloom over this receipt's logs.
    pub bloom: Bloom,
    /// Logs emitted.
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Receipt hash (leaf of the receipt root).
    pub fn hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        hasher.update([self.status]);
        hasher.update(self.cumulative_gas_used.to_be_bytes());
        hasher.update(self.bloom.0);
        for log in &self.logs {
            hasher.update(log.address);
            for topic in &log.topics {
                hasher.update(topic);
            }
            hasher.update((log.data.len() as u64).to_be_bytes());
            hasher.update(&log.data);
        }
        hasher.finalize().into()
    }
}

/// Merkle root over a list of receipts.
pub fn receipts_root(receipts: &[Receipt]) -> Hash {
    let leaves: Vec<Hash> = receipts.iter().map(Receipt::hash).collect();
    compute_merkle_root(&leaves)
}

/// Block body: the raw encoded transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    /// Encoded transactions, in block order.
    pub transactions: Vec<Vec<u8>>,
}

impl BlockBody {
    /// Merkle root over `keccak(tx)` leaves.
    pub fn tx_root(&self) -> Hash {
        let leaves: Vec<Hash> = self
            .transactions
            .iter()
            .map(|tx| Keccak256::digest(tx).into())
            .collect();
        compute_merkle_root(&leaves)
    }
}

/// A fully assembled block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    /// Sealed header.
    pub header: Header,
    /// Transactions.
    pub body: BlockBody,
    /// Receipts produced by executing the body.
    pub receipts: Vec<Receipt>,
}

impl Block {
    /// Assemble a block, committing transaction and receipt roots into the header.
    pub fn new(mut header: Header, body: BlockBody, receipts: Vec<Receipt>) -> Self {
        header.tx_root = body.tx_root();
        header.receipt_root = receipts_root(&receipts);
        let mut bloom = Bloom::default();
        for receipt in &receipts {
            bloom.accrue_bloom(&receipt.bloom);
        }
        header.bloom = bloom;
        Self {
            header,
            body,
            receipts,
        }
    }

    /// Hash of the block header.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Account state as proven against a state root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    /// Transaction count.
    pub nonce: u64,
    /// Balance in base units.
    pub balance: U256,
    /// Root of the account's storage.
    pub storage_root: Hash,
    /// Hash of the account's code.
    pub code_hash: Hash,
}

impl Account {
    /// Canonical byte encoding used as the proof value.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + 32 * 3);
        out.extend_from_slice(&self.nonce.to_be_bytes());
        let mut balance = [0u8; 32];
        self.balance.to_big_endian(&mut balance);
        out.extend_from_slice(&balance);
        out.extend_from_slice(&self.storage_root);
        out.extend_from_slice(&self.code_hash);
        out
    }

    /// Decode from [`Account::encode`] output.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 8 + 32 * 3 {
            return None;
        }
        let nonce = u64::from_be_bytes(bytes[0..8].try_into().ok()?);
        let balance = U256::from_big_endian(&bytes[8..40]);
        let storage_root: Hash = bytes[40..72].try_into().ok()?;
        let code_hash: Hash = bytes[72..104].try_into().ok()?;
        Some(Self {
            nonce,
            balance,
            storage_root,
            code_hash,
        })
    }
}
