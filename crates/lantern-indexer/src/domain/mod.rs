//! Section metadata and indexer errors.

pub mod errors;
pub mod section;

pub use errors::IndexerError;
pub use section::SectionMeta;
