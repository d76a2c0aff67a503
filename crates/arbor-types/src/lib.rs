//! Foundation types for the Arbor tree store.
//!
//! Every other Arbor crate depends on `arbor-types`.
//!
//! # Key Types
//!
//! - [`Key`] -- Content-derived identifier of a stored block
//! - [`Step`] -- A single non-empty path segment
//! - [`Path`] -- An ordered sequence of steps, root to leaf

pub mod error;
pub mod key;
pub mod path;

pub use error::TypeError;
pub use key::Key;
pub use path::{Path, Step};
