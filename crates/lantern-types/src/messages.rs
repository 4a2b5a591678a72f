//! # Retrieval Messages
//!
//! Wire-independent request descriptors and responses exchanged with serving
//! peers. Framing and handshakes live below this layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Address, BlockBody, Hash, Header, Receipt};
use crate::merkle::ProofNode;

/// Correlation id tying a reply to the attempt that requested it.
pub type RequestId = Uuid;

/// What is being fetched, plus the key material identifying it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Header with a fixed hash.
    HeaderByHash { hash: Hash },
    /// Canonical header at a height, as claimed by the peer.
    HeaderByNumber { number: u64 },
    /// Transactions of a block.
    BlockBody { hash: Hash, number: u64 },
    /// Receipts of a block.
    Receipts { hash: Hash, number: u64 },
    /// Account state under a state root.
    AccountProof { state_root: Hash, address: Address },
    /// One storage slot of an account under a state root.
    StorageProof {
        state_root: Hash,
        address: Address,
        key: Hash,
    },
    /// Canonical header at `number`, proven against CHT section `section`.
    ChtProof { section: u64, number: u64 },
    /// Per-section bloom bit vector, proven against BloomTrie section `section`.
    BloomTrieProof { section: u64, bit: u32 },
    /// The peer's current head. The answer changes over time.
    LatestHeader,
}

/// Request classes sharing one retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestClass {
    /// Headers by hash or number.
    Header,
    /// Block bodies.
    Body,
    /// Receipts.
    Receipts,
    /// Account and storage proofs.
    State,
    /// CHT and BloomTrie proofs.
    Checkpoint,
    /// Latest head.
    Latest,
}

impl RequestKind {
    /// Whether the answer can change over time. Mutable requests are never
    /// coalesced. A number resolves to a different header after a reorg.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self,
            RequestKind::LatestHeader | RequestKind::HeaderByNumber { .. }
        )
    }

    /// Retry class of this request.
    pub fn class(&self) -> RequestClass {
        match self {
            RequestKind::HeaderByHash { .. } | RequestKind::HeaderByNumber { .. } => {
                RequestClass::Header
            }
            RequestKind::BlockBody { .. } => RequestClass::Body,
            RequestKind::Receipts { .. } => RequestClass::Receipts,
            RequestKind::AccountProof { .. } | RequestKind::StorageProof { .. } => {
                RequestClass::State
            }
            RequestKind::ChtProof { .. } | RequestKind::BloomTrieProof { .. } => {
                RequestClass::Checkpoint
            }
            RequestKind::LatestHeader => RequestClass::Latest,
        }
    }

    /// Short name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::HeaderByHash { .. } => "header_by_hash",
            RequestKind::HeaderByNumber { .. } => "header_by_number",
            RequestKind::BlockBody { .. } => "block_body",
            RequestKind::Receipts { .. } => "receipts",
            RequestKind::AccountProof { .. } => "account_proof",
            RequestKind::StorageProof { .. } => "storage_proof",
            RequestKind::ChtProof { .. } => "cht_proof",
            RequestKind::BloomTrieProof { .. } => "bloom_trie_proof",
            RequestKind::LatestHeader => "latest_header",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = |h: &[u8]| hex::encode(&h[..4]);
        match self {
            RequestKind::HeaderByHash { hash } => write!(f, "header_by_hash({}..)", short(hash)),
            RequestKind::HeaderByNumber { number } => write!(f, "header_by_number({number})"),
            RequestKind::BlockBody { hash, number } => {
                write!(f, "block_body(#{number} {}..)", short(hash))
            }
            RequestKind::Receipts { hash, number } => {
                write!(f, "receipts(#{number} {}..)", short(hash))
            }
            RequestKind::AccountProof { state_root, address } => write!(
                f,
                "account_proof({}.. @ {}..)",
                short(address),
                short(state_root)
            ),
            RequestKind::StorageProof {
                state_root,
                address,
                key,
            } => write!(
                f,
                "storage_proof({}..[{}..] @ {}..)",
                short(address),
                short(key),
                short(state_root)
            ),
            RequestKind::ChtProof { section, number } => {
                write!(f, "cht_proof(section {section}, #{number})")
            }
            RequestKind::BloomTrieProof { section, bit } => {
                write!(f, "bloom_trie_proof(section {section}, bit {bit})")
            }
            RequestKind::LatestHeader => f.write_str("latest_header"),
        }
    }
}

/// A peer's answer to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    /// One or more headers.
    Headers(Vec<Header>),
    /// A block body.
    Body(BlockBody),
    /// A block's receipts.
    Receipts(Vec<Receipt>),
    /// A proven value (account or storage slot).
    Proof { value: Vec<u8>, nodes: Vec<ProofNode> },
    /// A header proven against a CHT root.
    HeaderProof { header: Header, nodes: Vec<ProofNode> },
    /// A bloom bit vector proven against a BloomTrie root.
    BloomBits { bits: Vec<u8>, nodes: Vec<ProofNode> },
}

impl Response {
    /// Variant name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Response::Headers(_) => "headers",
            Response::Body(_) => "body",
            Response::Receipts(_) => "receipts",
            Response::Proof { .. } => "proof",
            Response::HeaderProof { .. } => "header_proof",
            Response::BloomBits { .. } => "bloom_bits",
        }
    }
}
