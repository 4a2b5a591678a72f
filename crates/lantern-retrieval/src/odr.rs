//! # On-Demand Retrieval
//!
//! Typed retrievals built on [`RetrieveManager::retrieve`], each anchored to
//! something the node already trusts: the local chain, a sealed checkpoint
//! section, or a verified header.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lantern_consensus::HeaderVerifier;
use lantern_types::{
    Account, Address, BlockBody, ChainReader, CheckpointRoots, Hash, Header, Receipt,
    RequestKind, Response,
};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::domain::{Request, RetrievalError};
use crate::manager::RetrieveManager;
use crate::validation::{
    BloomTrieValidator, BodyValidator, ChtProofValidator, HeaderHashValidator,
    HeaderNumberValidator, LatestHeaderValidator, ReceiptsValidator, ResponseValidator,
    StateProofValidator,
};

/// Typed retrieval facade.
pub struct LightOdr {
    manager: Arc<RetrieveManager>,
    chain: Arc<dyn ChainReader>,
    verifier: Arc<HeaderVerifier>,
    cht: Option<Arc<dyn CheckpointRoots>>,
    bloom_trie: Option<Arc<dyn CheckpointRoots>>,
    headers: Mutex<LruCache<Hash, Header>>,
}

fn unexpected(kind: &RequestKind, response: &Response) -> RetrievalError {
    RetrievalError::UnexpectedResponse {
        request: kind.to_string(),
        got: response.name(),
    }
}

fn into_single_header(kind: &RequestKind, response: Response) -> Result<Header, RetrievalError> {
    match response {
        Response::Headers(mut headers) if headers.len() == 1 => Ok(headers.remove(0)),
        other => Err(unexpected(kind, &other)),
    }
}

impl LightOdr {
    /// Facade over `manager`, anchored to `chain`.
    pub fn new(
        manager: Arc<RetrieveManager>,
        chain: Arc<dyn ChainReader>,
        verifier: Arc<HeaderVerifier>,
    ) -> Self {
        let capacity =
            NonZeroUsize::new(manager.config().header_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            manager,
            chain,
            verifier,
            cht: None,
            bloom_trie: None,
            headers: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Prove historical canonical headers against these CHT roots.
    pub fn with_cht(mut self, cht: Arc<dyn CheckpointRoots>) -> Self {
        self.cht = Some(cht);
        self
    }

    /// Prove bloom bits against these BloomTrie roots.
    pub fn with_bloom_trie(mut self, bloom_trie: Arc<dyn CheckpointRoots>) -> Self {
        self.bloom_trie = Some(bloom_trie);
        self
    }

    /// The underlying manager.
    pub fn manager(&self) -> &Arc<RetrieveManager> {
        &self.manager
    }

    fn request(&self, kind: RequestKind, validator: impl ResponseValidator + 'static) -> Request {
        Request::new(kind, validator, self.manager.config())
    }

    fn cached(&self, hash: &Hash) -> Option<Header> {
        self.headers.lock().get(hash).cloned()
    }

    fn remember(&self, header: &Header) {
        self.headers.lock().put(header.hash(), header.clone());
    }

    /// Header with a known hash.
    pub async fn header_by_hash(&self, hash: Hash) -> Result<Header, RetrievalError> {
        if let Some(header) = self.cached(&hash) {
            return Ok(header);
        }
        let kind = RequestKind::HeaderByHash { hash };
        let request = self.request(kind.clone(), HeaderHashValidator::new(hash));
        let header = into_single_header(&kind, self.manager.retrieve(request).await?)?;
        self.remember(&header);
        Ok(header)
    }

    /// Canonical header at `number`.
    ///
    /// Served from the local chain when present, proven through a sealed CHT
    /// section when one covers the block, and otherwise checked against the
    /// local parent (consensus rules included) when that is known.
    pub async fn header_by_number(&self, number: u64) -> Result<Header, RetrievalError> {
        if let Some(header) = self.chain.get_header_by_number(number) {
            return Ok(header);
        }

        if let Some(cht) = &self.cht {
            let size = cht.section_size();
            let section = number / size.max(1);
            if let Some(root) = cht.section_root(section) {
                let kind = RequestKind::ChtProof { section, number };
                let request = self.request(
                    kind.clone(),
                    ChtProofValidator::new(root, size, section, number),
                );
                return match self.manager.retrieve(request).await? {
                    Response::HeaderProof { header, .. } => {
                        self.remember(&header);
                        Ok(header)
                    }
                    other => Err(unexpected(&kind, &other)),
                };
            }
        }

        let mut validator = HeaderNumberValidator::new(number);
        if let Some(parent) = number
            .checked_sub(1)
            .and_then(|n| self.chain.get_header_by_number(n))
        {
            trace!(number, "Checking retrieved header against local parent");
            validator = validator.with_parent(parent, Arc::clone(&self.verifier));
        }
        let kind = RequestKind::HeaderByNumber { number };
        let request = self.request(kind.clone(), validator);
        let header = into_single_header(&kind, self.manager.retrieve(request).await?)?;
        self.remember(&header);
        Ok(header)
    }

    async fn trusted_header(&self, hash: Hash, number: u64) -> Result<Header, RetrievalError> {
        if let Some(header) = self.chain.get_header(&hash, number) {
            return Ok(header);
        }
        self.header_by_hash(hash).await
    }

    /// Transactions of block `hash`.
    pub async fn block_body(&self, hash: Hash, number: u64) -> Result<BlockBody, RetrievalError> {
        let header = self.trusted_header(hash, number).await?;
        let kind = RequestKind::BlockBody { hash, number };
        let request = self.request(kind.clone(), BodyValidator::new(header.tx_root));
        match self.manager.retrieve(request).await? {
            Response::Body(body) => Ok(body),
            other => Err(unexpected(&kind, &other)),
        }
    }

    /// Receipts of block `hash`.
    pub async fn receipts(&self, hash: Hash, number: u64) -> Result<Vec<Receipt>, RetrievalError> {
        let header = self.trusted_header(hash, number).await?;
        let kind = RequestKind::Receipts { hash, number };
        let request = self.request(kind.clone(), ReceiptsValidator::new(header.receipt_root));
        match self.manager.retrieve(request).await? {
            Response::Receipts(receipts) => Ok(receipts),
            other => Err(unexpected(&kind, &other)),
        }
    }

    /// Account record under `state_root`.
    pub async fn account(
        &self,
        state_root: Hash,
        address: Address,
    ) -> Result<Account, RetrievalError> {
        let kind = RequestKind::AccountProof {
            state_root,
            address,
        };
        let request = self.request(
            kind.clone(),
            StateProofValidator::account(state_root, &address),
        );
        match self.manager.retrieve(request).await? {
            Response::Proof { value, .. } => {
                Account::decode(&value).ok_or_else(|| RetrievalError::UnexpectedResponse {
                    request: kind.to_string(),
                    got: "proof",
                })
            }
            other => Err(unexpected(&kind, &other)),
        }
    }

    /// Storage slot `key` of `address` under `state_root`.
    pub async fn storage(
        &self,
        state_root: Hash,
        address: Address,
        key: Hash,
    ) -> Result<Vec<u8>, RetrievalError> {
        let kind = RequestKind::StorageProof {
            state_root,
            address,
            key,
        };
        let request = self.request(
            kind.clone(),
            StateProofValidator::storage(state_root, &address, &key),
        );
        match self.manager.retrieve(request).await? {
            Response::Proof { value, .. } => Ok(value),
            other => Err(unexpected(&kind, &other)),
        }
    }

    /// Bloom bit `bit` across every block of BloomTrie section `section`,
    /// one bit per block, most significant bit first.
    pub async fn bloom_bits(&self, section: u64, bit: u32) -> Result<Vec<u8>, RetrievalError> {
        let kind = RequestKind::BloomTrieProof { section, bit };
        let Some((root, size)) = self
            .bloom_trie
            .as_ref()
            .and_then(|trie| Some((trie.section_root(section)?, trie.section_size())))
        else {
            return Err(RetrievalError::MissingCheckpoint {
                request: kind.to_string(),
                section,
            });
        };
        let request = self.request(kind.clone(), BloomTrieValidator::new(root, size, bit));
        match self.manager.retrieve(request).await? {
            Response::BloomBits { bits, .. } => Ok(bits),
            other => Err(unexpected(&kind, &other)),
        }
    }

    /// The best head any eligible peer reports, no older than ours.
    /// Never shared with other callers.
    pub async fn latest_header(&self) -> Result<Header, RetrievalError> {
        let local = self.chain.current_header().number;
        let kind = RequestKind::LatestHeader;
        let request = self
            .request(kind.clone(), LatestHeaderValidator::new(local))
            .with_min_head(local);
        into_single_header(&kind, self.manager.retrieve(request).await?)
    }
}
