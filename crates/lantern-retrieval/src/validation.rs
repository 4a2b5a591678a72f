//! # Response Validators
//!
//! Every reply is checked before it is handed to a caller. Validators are
//! pure: they see only the reply and the trusted anchors captured when the
//! request was built.
//!
//! | Validator | Anchor |
//! |-----------|--------|
//! | [`HeaderHashValidator`] | requested hash |
//! | [`HeaderNumberValidator`] | requested number, optional trusted hash or parent |
//! | [`BodyValidator`] | header transaction root |
//! | [`ReceiptsValidator`] | header receipt root |
//! | [`StateProofValidator`] | state root |
//! | [`ChtProofValidator`] | sealed CHT section root |
//! | [`BloomTrieValidator`] | sealed BloomTrie section root |
//! | [`LatestHeaderValidator`] | local head number |

use std::sync::Arc;

use lantern_consensus::HeaderVerifier;
use lantern_types::{
    bloom_trie_leaf, cht_leaf, keccak256, packed_len, proof_index, receipts_root, state_leaf,
    tree_depth, verify_merkle_proof, Account, Address, Hash, Header, ProofNode, Response,
    BLOOM_BITS,
};

use crate::domain::ValidationError;

/// Check applied to a peer's reply.
pub trait ResponseValidator: Send + Sync {
    /// Accept or reject `response`.
    fn validate(&self, response: &Response) -> Result<(), ValidationError>;
}

fn unexpected(expected: &'static str, response: &Response) -> ValidationError {
    ValidationError::UnexpectedResponse {
        expected,
        got: response.name(),
    }
}

fn single_header(response: &Response) -> Result<&Header, ValidationError> {
    match response {
        Response::Headers(headers) if headers.len() == 1 => Ok(&headers[0]),
        Response::Headers(headers) => Err(ValidationError::WrongCount {
            expected: 1,
            actual: headers.len(),
        }),
        other => Err(unexpected("headers", other)),
    }
}

fn check_path(
    leaf: &Hash,
    nodes: &[ProofNode],
    root: &Hash,
    leaf_index: usize,
    leaf_count: usize,
) -> Result<(), ValidationError> {
    let depth = tree_depth(leaf_count);
    if nodes.len() != depth {
        return Err(ValidationError::InvalidProof(format!(
            "path length {} for depth {depth}",
            nodes.len()
        )));
    }
    if proof_index(nodes) != Some(leaf_index) {
        return Err(ValidationError::InvalidProof(format!(
            "path does not lead to leaf {leaf_index}"
        )));
    }
    if !verify_merkle_proof(leaf, nodes, root) {
        return Err(ValidationError::InvalidProof("root mismatch".to_string()));
    }
    Ok(())
}

/// The reply is exactly the header with a given hash.
#[derive(Debug, Clone)]
pub struct HeaderHashValidator {
    hash: Hash,
}

impl HeaderHashValidator {
    /// Expect the header hashing to `hash`.
    pub fn new(hash: Hash) -> Self {
        Self { hash }
    }
}

impl ResponseValidator for HeaderHashValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let header = single_header(response)?;
        let actual = header.hash();
        if actual != self.hash {
            return Err(ValidationError::HashMismatch {
                expected: self.hash,
                actual,
            });
        }
        Ok(())
    }
}

/// The reply is one header at a given number.
///
/// With a trusted hash the header must match it. With a trusted parent the
/// header must link to it and pass full consensus verification.
#[derive(Clone)]
pub struct HeaderNumberValidator {
    number: u64,
    trusted_hash: Option<Hash>,
    parent: Option<(Header, Arc<HeaderVerifier>)>,
}

impl HeaderNumberValidator {
    /// Structural check only.
    pub fn new(number: u64) -> Self {
        Self {
            number,
            trusted_hash: None,
            parent: None,
        }
    }

    /// Require the header to hash to `hash`.
    pub fn with_trusted_hash(mut self, hash: Hash) -> Self {
        self.trusted_hash = Some(hash);
        self
    }

    /// Verify the header against a known parent.
    pub fn with_parent(mut self, parent: Header, verifier: Arc<HeaderVerifier>) -> Self {
        self.parent = Some((parent, verifier));
        self
    }
}

impl ResponseValidator for HeaderNumberValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let header = single_header(response)?;
        if header.number != self.number {
            return Err(ValidationError::NumberMismatch {
                expected: self.number,
                actual: header.number,
            });
        }
        if let Some(expected) = self.trusted_hash {
            let actual = header.hash();
            if actual != expected {
                return Err(ValidationError::HashMismatch { expected, actual });
            }
        }
        if let Some((parent, verifier)) = &self.parent {
            let parent_hash = parent.hash();
            if header.parent_hash != parent_hash {
                return Err(ValidationError::HashMismatch {
                    expected: parent_hash,
                    actual: header.parent_hash,
                });
            }
            verifier.verify_with_parent(header, parent, true)?;
        }
        Ok(())
    }
}

/// The reply is a body whose transactions reproduce a transaction root.
#[derive(Debug, Clone)]
pub struct BodyValidator {
    tx_root: Hash,
}

impl BodyValidator {
    /// Expect `tx_root`.
    pub fn new(tx_root: Hash) -> Self {
        Self { tx_root }
    }
}

impl ResponseValidator for BodyValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let Response::Body(body) = response else {
            return Err(unexpected("body", response));
        };
        let actual = body.tx_root();
        if actual != self.tx_root {
            return Err(ValidationError::RootMismatch {
                expected: self.tx_root,
                actual,
            });
        }
        Ok(())
    }
}

/// The reply is a receipt list reproducing a receipt root.
#[derive(Debug, Clone)]
pub struct ReceiptsValidator {
    receipt_root: Hash,
}

impl ReceiptsValidator {
    /// Expect `receipt_root`.
    pub fn new(receipt_root: Hash) -> Self {
        Self { receipt_root }
    }
}

impl ResponseValidator for ReceiptsValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let Response::Receipts(receipts) = response else {
            return Err(unexpected("receipts", response));
        };
        let actual = receipts_root(receipts);
        if actual != self.receipt_root {
            return Err(ValidationError::RootMismatch {
                expected: self.receipt_root,
                actual,
            });
        }
        Ok(())
    }
}

/// State trie key of an account.
pub fn account_key(address: &Address) -> Hash {
    keccak256(address)
}

/// State trie key of one storage slot.
pub fn storage_key(address: &Address, slot: &Hash) -> Hash {
    let mut buf = [0u8; 52];
    buf[..20].copy_from_slice(address);
    buf[20..].copy_from_slice(slot);
    keccak256(buf)
}

/// The reply proves a value under a state root.
#[derive(Debug, Clone)]
pub struct StateProofValidator {
    state_root: Hash,
    key: Hash,
    account: bool,
}

impl StateProofValidator {
    /// Proof of an account record.
    pub fn account(state_root: Hash, address: &Address) -> Self {
        Self {
            state_root,
            key: account_key(address),
            account: true,
        }
    }

    /// Proof of a storage slot.
    pub fn storage(state_root: Hash, address: &Address, slot: &Hash) -> Self {
        Self {
            state_root,
            key: storage_key(address, slot),
            account: false,
        }
    }
}

impl ResponseValidator for StateProofValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let Response::Proof { value, nodes } = response else {
            return Err(unexpected("proof", response));
        };
        if self.account && Account::decode(value).is_none() {
            return Err(ValidationError::Malformed(format!(
                "account record of {} bytes",
                value.len()
            )));
        }
        let leaf = state_leaf(&self.key, value);
        if !verify_merkle_proof(&leaf, nodes, &self.state_root) {
            return Err(ValidationError::InvalidProof(
                "value not under state root".to_string(),
            ));
        }
        Ok(())
    }
}

/// The reply proves a header is canonical block `number` under a sealed
/// CHT section root.
#[derive(Debug, Clone)]
pub struct ChtProofValidator {
    root: Hash,
    section_size: u64,
    section: u64,
    number: u64,
}

impl ChtProofValidator {
    /// Check against `root`, the sealed root of `section`.
    pub fn new(root: Hash, section_size: u64, section: u64, number: u64) -> Self {
        Self {
            root,
            section_size,
            section,
            number,
        }
    }
}

impl ResponseValidator for ChtProofValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let Response::HeaderProof { header, nodes } = response else {
            return Err(unexpected("header_proof", response));
        };
        if header.number != self.number {
            return Err(ValidationError::NumberMismatch {
                expected: self.number,
                actual: header.number,
            });
        }
        let offset = self
            .number
            .checked_sub(self.section * self.section_size)
            .filter(|offset| *offset < self.section_size)
            .ok_or_else(|| {
                ValidationError::Malformed(format!(
                    "block {} outside section {}",
                    self.number, self.section
                ))
            })?;
        let leaf = cht_leaf(header.number, &header.hash());
        check_path(
            &leaf,
            nodes,
            &self.root,
            1 + offset as usize,
            self.section_size as usize + 1,
        )
    }
}

/// The reply proves one bloom bit vector under a sealed BloomTrie root.
#[derive(Debug, Clone)]
pub struct BloomTrieValidator {
    root: Hash,
    section_size: u64,
    bit: u32,
}

impl BloomTrieValidator {
    /// Check bit `bit` against `root`.
    pub fn new(root: Hash, section_size: u64, bit: u32) -> Self {
        Self {
            root,
            section_size,
            bit,
        }
    }
}

impl ResponseValidator for BloomTrieValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let Response::BloomBits { bits, nodes } = response else {
            return Err(unexpected("bloom_bits", response));
        };
        if self.bit as usize >= BLOOM_BITS {
            return Err(ValidationError::Malformed(format!("bloom bit {}", self.bit)));
        }
        let expected = packed_len(self.section_size);
        if bits.len() != expected {
            return Err(ValidationError::WrongCount {
                expected,
                actual: bits.len(),
            });
        }
        let leaf = bloom_trie_leaf(self.bit, bits);
        check_path(&leaf, nodes, &self.root, 1 + self.bit as usize, BLOOM_BITS + 1)
    }
}

/// The reply is one header no older than the local head.
#[derive(Debug, Clone)]
pub struct LatestHeaderValidator {
    min_number: u64,
}

impl LatestHeaderValidator {
    /// Require a head at or above `min_number`.
    pub fn new(min_number: u64) -> Self {
        Self { min_number }
    }
}

impl ResponseValidator for LatestHeaderValidator {
    fn validate(&self, response: &Response) -> Result<(), ValidationError> {
        let header = single_header(response)?;
        if header.number < self.min_number {
            return Err(ValidationError::NumberMismatch {
                expected: self.min_number,
                actual: header.number,
            });
        }
        Ok(())
    }
}
