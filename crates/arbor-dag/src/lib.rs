//! Commit history for the Arbor tree store.
//!
//! Commits form a DAG by naming their parents' keys. [`History`] creates
//! commits, walks ancestry, numbers generations, and finds the lowest common
//! ancestor used as the base of a three-way merge.

pub mod error;
pub mod history;

pub use error::{DagError, DagResult};
pub use history::History;
