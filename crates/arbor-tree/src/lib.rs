//! Path-addressed trees over the Arbor block store.
//!
//! [`NodeStore`] navigates and rewrites trees of immutable, hash-keyed
//! [`Node`](arbor_store::Node)s. Rewrites return a new root and re-persist
//! only the ancestor chain of the touched path; everything else is shared
//! by key with the previous version.
//!
//! [`Rec`] is the self-referential variant whose leaf contents are keys into
//! the same store.

pub mod error;
pub mod node_store;
pub mod rec;

pub use error::{TreeError, TreeResult};
pub use node_store::{Child, NodeStore};
pub use rec::Rec;
