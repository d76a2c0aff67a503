//! Error types for tree operations.

use arbor_store::StoreError;
use arbor_types::{Path, TypeError};

/// Errors that can occur while reading or rewriting a tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A strict (`_exn`) lookup found nothing at `path`.
    #[error("nothing found at {path}")]
    NotFound { path: Path },

    /// A path or step could not be constructed.
    #[error("invalid path: {0}")]
    InvalidPath(#[from] TypeError),

    /// The underlying block store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for tree results.
pub type TreeResult<T> = Result<T, TreeError>;
