use lantern_storage::StorageError;
use lantern_types::Hash;
use thiserror::Error;

/// Indexer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexerError {
    /// The section store failed.
    #[error("section store: {0}")]
    Storage(#[from] StorageError),

    /// The canonical chain has no header at a height below the final head.
    #[error("canonical header {number} missing")]
    MissingHeader { number: u64 },

    /// The chain reorganised below an already sealed section.
    #[error(
        "reorg below sealed section {section}: block {number} no longer extends {}",
        hex::encode(sealed_head)
    )]
    SealedSectionReorged {
        section: u64,
        number: u64,
        sealed_head: Hash,
    },

    /// Stored metadata is inconsistent.
    #[error("section metadata corrupt: {0}")]
    Corrupt(String),
}
