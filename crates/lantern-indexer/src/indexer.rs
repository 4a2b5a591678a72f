//! # Chain Indexer
//!
//! Drives an [`IndexerBackend`] along the canonical chain and seals sections.
//!
//! Only blocks at least `confirmations` below the head are fed. Sections seal
//! strictly in order and are never retracted. If the canonical chain changes
//! under the section being accumulated, that partial work is discarded and
//! the section restarts from the new canonical headers. A section whose seal
//! cannot be written restarts the same way and seals on a later head.

use std::sync::Arc;

use lantern_storage::{KeyValueStore, Table};
use lantern_types::{ChainEvent, ChainReader, CheckpointRoots, Hash, Header, ShutdownSignal};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::backend::{BloomTrieBackend, ChtBackend, IndexerBackend};
use crate::config::IndexerConfig;
use crate::domain::section::section_key;
use crate::domain::{IndexerError, SectionMeta};
use crate::metrics;

struct Progress {
    /// Section being accumulated.
    section: u64,
    /// Next block to feed.
    next: u64,
    /// Hash of block `next - 1`.
    last_hash: Option<Hash>,
}

struct IndexerState<B> {
    backend: B,
    progress: Progress,
}

/// Background indexer over the canonical chain.
pub struct ChainIndexer<B: IndexerBackend> {
    chain: Arc<dyn ChainReader>,
    confirmations: u64,
    section_size: u64,
    sections: RwLock<Vec<SectionMeta>>,
    table: Table<SectionMeta>,
    state: Mutex<IndexerState<B>>,
}

/// CHT indexer.
pub type ChtIndexer = ChainIndexer<ChtBackend>;

/// BloomTrie indexer.
pub type BloomTrieIndexer = ChainIndexer<BloomTrieBackend>;

impl ChainIndexer<ChtBackend> {
    /// CHT indexer with the configured geometry.
    pub fn cht(
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn KeyValueStore>,
        config: &IndexerConfig,
    ) -> Result<Self, IndexerError> {
        Self::new(chain, store, ChtBackend::new(config.section_size), config.confirmations)
    }
}

impl ChainIndexer<BloomTrieBackend> {
    /// BloomTrie indexer with the configured geometry.
    pub fn bloom_trie(
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn KeyValueStore>,
        config: &IndexerConfig,
    ) -> Result<Self, IndexerError> {
        Self::new(
            chain,
            store,
            BloomTrieBackend::new(config.bloom_section_size),
            config.confirmations,
        )
    }
}

impl<B: IndexerBackend> ChainIndexer<B> {
    /// Create an indexer, reloading previously sealed sections from `store`.
    pub fn new(
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn KeyValueStore>,
        mut backend: B,
        confirmations: u64,
    ) -> Result<Self, IndexerError> {
        let section_size = backend.section_size();
        if section_size == 0 {
            return Err(IndexerError::Corrupt("section size is zero".to_string()));
        }

        let table: Table<SectionMeta> = Table::new(store, B::SECTION_PREFIX);
        let mut sections = Vec::new();
        while let Some(meta) = table.get(&section_key(sections.len() as u64))? {
            sections.push(meta);
        }

        let count = sections.len() as u64;
        let last = sections.last().copied();
        backend.reset(count, last.map(|m| m.root).unwrap_or_default());
        info!(indexer = B::NAME, sections = count, "Loaded sealed sections");

        Ok(Self {
            chain,
            confirmations,
            section_size,
            sections: RwLock::new(sections),
            table,
            state: Mutex::new(IndexerState {
                backend,
                progress: Progress {
                    section: count,
                    next: count * section_size,
                    last_hash: last.map(|m| m.head_hash),
                },
            }),
        })
    }

    /// Root of sealed section `index`.
    pub fn section_root(&self, index: u64) -> Option<Hash> {
        self.section(index).map(|m| m.root)
    }

    /// Metadata of sealed section `index`.
    pub fn section(&self, index: u64) -> Option<SectionMeta> {
        self.sections.read().get(index as usize).copied()
    }

    /// Number of sealed sections.
    pub fn section_count(&self) -> u64 {
        self.sections.read().len() as u64
    }

    /// Sealed section count and the last block hash of the newest section.
    pub fn sections(&self) -> (u64, Option<Hash>) {
        let sections = self.sections.read();
        (sections.len() as u64, sections.last().map(|m| m.head_hash))
    }

    /// Feed every newly final block below `head`. Returns the number of
    /// sections sealed.
    pub fn process_head(&self, head: &Header) -> Result<u64, IndexerError> {
        let Some(target) = head.number.checked_sub(self.confirmations) else {
            return Ok(0);
        };

        let mut state = self.state.lock();
        if !self.partial_still_canonical(&state.progress) {
            self.restart_section(&mut state, "Reorg under unsealed section, restarting");
        }

        let mut sealed = 0;
        let mut restarted = false;
        while state.progress.next <= target {
            let number = state.progress.next;
            let header = self
                .chain
                .get_header_by_number(number)
                .ok_or(IndexerError::MissingHeader { number })?;

            if let Some(parent) = state.progress.last_hash {
                if header.parent_hash != parent {
                    if number == state.progress.section * self.section_size {
                        return Err(IndexerError::SealedSectionReorged {
                            section: state.progress.section - 1,
                            number,
                            sealed_head: parent,
                        });
                    }
                    if restarted {
                        // Chain still moving; pick up again on the next head
                        debug!(indexer = B::NAME, number, "Canonical chain unsettled");
                        break;
                    }
                    self.restart_section(&mut state, "Reorg under unsealed section, restarting");
                    restarted = true;
                    continue;
                }
            }

            state.backend.process(&header);
            state.progress.last_hash = Some(header.hash());
            state.progress.next += 1;

            if state.progress.next == (state.progress.section + 1) * self.section_size {
                if let Err(e) = self.seal(&mut state, head.number) {
                    self.restart_section(&mut state, "Seal failed, restarting section");
                    return Err(e);
                }
                metrics::record_section_sealed(B::NAME);
                sealed += 1;
            }
        }
        Ok(sealed)
    }

    fn partial_still_canonical(&self, progress: &Progress) -> bool {
        let start = progress.section * self.section_size;
        if progress.next <= start {
            return true;
        }
        let Some(expected) = progress.last_hash else {
            return true;
        };
        self.chain
            .get_header_by_number(progress.next - 1)
            .is_some_and(|h| h.hash() == expected)
    }

    fn restart_section(&self, state: &mut IndexerState<B>, reason: &'static str) {
        let section = state.progress.section;
        let prev = section
            .checked_sub(1)
            .and_then(|index| self.section(index));
        info!(
            indexer = B::NAME,
            section,
            discarded = state.progress.next - section * self.section_size,
            "{reason}"
        );
        state
            .backend
            .reset(section, prev.map(|m| m.root).unwrap_or_default());
        state.progress.next = section * self.section_size;
        state.progress.last_hash = prev.map(|m| m.head_hash);
    }

    fn seal(&self, state: &mut IndexerState<B>, head_number: u64) -> Result<(), IndexerError> {
        let section = state.progress.section;
        let root = state.backend.commit();
        let meta = SectionMeta {
            root,
            sealed_at_block: head_number,
            head_hash: state.progress.last_hash.unwrap_or_default(),
        };

        {
            let mut sections = self.sections.write();
            if sections.len() as u64 != section {
                return Err(IndexerError::Corrupt(format!(
                    "sealing section {section} with {} sealed",
                    sections.len()
                )));
            }
            self.table.put(&section_key(section), &meta)?;
            sections.push(meta);
        }

        info!(
            indexer = B::NAME,
            section,
            root = %hex::encode(root),
            "Sealed section"
        );
        state.progress.section += 1;
        state.backend.reset(section + 1, root);
        Ok(())
    }

    fn index_head(&self, head: &Header) {
        if let Err(e) = self.process_head(head) {
            warn!(indexer = B::NAME, head = head.number, error = %e, "Indexing failed");
        }
    }

    /// Follow canonical head events until `shutdown` fires.
    pub async fn run(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        let mut events = self.chain.subscribe();
        self.index_head(&self.chain.current_header());

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    info!(indexer = B::NAME, "Indexer stopping");
                    return;
                }
                event = events.recv() => match event {
                    Ok(ChainEvent::Head(head)) => self.index_head(&head),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(indexer = B::NAME, skipped, "Head events lagged");
                        self.index_head(&self.chain.current_header());
                    }
                    Err(RecvError::Closed) => return,
                },
            }
        }
    }
}

impl<B: IndexerBackend> CheckpointRoots for ChainIndexer<B> {
    fn section_size(&self) -> u64 {
        self.section_size
    }

    fn section_count(&self) -> u64 {
        ChainIndexer::section_count(self)
    }

    fn section_root(&self, index: u64) -> Option<Hash> {
        ChainIndexer::section_root(self, index)
    }
}
