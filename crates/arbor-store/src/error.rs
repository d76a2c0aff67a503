use arbor_types::Key;

use crate::block::BlockKind;

/// Errors from block store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested block was not found.
    #[error("block not found: {0}")]
    NotFound(Key),

    /// A block was read through a typed accessor that does not match its tag.
    #[error("type mismatch for {key}: expected {expected}, got {actual}")]
    TypeMismatch {
        key: Key,
        expected: BlockKind,
        actual: BlockKind,
    },

    /// The bytes returned for a key do not hash to that key (data corruption),
    /// or a backend minted a key that disagrees with the block encoding.
    #[error("hash mismatch for {key}: computed {computed}")]
    HashMismatch { key: Key, computed: Key },

    /// A block could not be encoded, or its bytes are malformed.
    #[error("codec error: {0}")]
    Codec(String),

    /// I/O error from a filesystem backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a backend, passed through unmodified.
    #[error("storage error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The store configuration is invalid.
    #[error("invalid store configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Wrap an arbitrary backend failure.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
