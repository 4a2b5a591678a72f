//! Storage error type.

/// Failures reported by a [`crate::KeyValueStore`] or [`crate::Table`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Backend read/write failure.
    #[error("storage I/O error: {message}")]
    Io { message: String },

    /// Stored bytes could not be decoded.
    #[error("storage corruption: {message}")]
    Corruption { message: String },

    /// Value could not be encoded.
    #[error("storage encoding error: {message}")]
    Encoding { message: String },

    /// Backend not available in this build.
    #[error("unsupported storage backend: {0}")]
    Unsupported(String),
}
