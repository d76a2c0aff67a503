//! Merge engine for the Arbor tree store.
//!
//! Merging is three-way throughout and reports divergence as data:
//!
//! - [`three_way`] -- the base case over any comparable value
//! - [`ContentsMerge`] -- pluggable resolvers for leaf payloads
//!   ([`DefaultMerge`], [`CounterMerge`], or a closure)
//! - [`NodeMerger`] -- structural merge of two trees against their ancestor
//! - [`CommitMerger`] -- history merge through the lowest common ancestor
//!
//! Every merge visits the whole divergent region and collects all
//! conflicts. If any conflict remains the result is
//! [`MergeOutcome::Conflict`] and nothing is committed.

pub mod commit;
pub mod error;
pub mod node;
pub mod outcome;
pub mod resolver;

pub use commit::CommitMerger;
pub use error::{MergeError, MergeResult};
pub use node::NodeMerger;
pub use outcome::{three_way, Conflict, MergeOutcome};
pub use resolver::{ContentsMerge, CounterMerge, DefaultMerge};
