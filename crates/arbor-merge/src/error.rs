//! Error types for the merge engine.
//!
//! Conflicts are not errors; they are reported through
//! [`MergeOutcome`](crate::MergeOutcome). These variants cover failures of
//! the stores the merge reads from and writes to.

use arbor_dag::DagError;
use arbor_store::StoreError;
use arbor_tree::TreeError;

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("history error: {0}")]
    Dag(#[from] DagError),
}

/// Convenience alias for merge results.
pub type MergeResult<T> = Result<T, MergeError>;
