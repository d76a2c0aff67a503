//! Error types for commit history operations.

use arbor_store::StoreError;
use arbor_types::Key;

/// Errors that can occur while reading or extending history.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    /// A referenced commit was not found in the store.
    #[error("commit not found: {0}")]
    CommitNotFound(Key),

    /// A new commit names a parent that does not exist.
    #[error("dangling parent reference: missing parent {parent}")]
    DanglingParent { parent: Key },

    /// A new commit names a tree root that does not exist.
    #[error("tree not found: {0}")]
    TreeNotFound(Key),

    /// The underlying block store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for history results.
pub type DagResult<T> = Result<T, DagError>;
