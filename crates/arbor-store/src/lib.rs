//! Content-addressed block storage for the Arbor tree store.
//!
//! Every value Arbor persists is a [`Block`]: raw contents, a tree [`Node`],
//! a [`Commit`], or a bare [`Key`](arbor_types::Key) reference. Blocks are
//! written with a leading tag byte and keyed by the BLAKE3 hash of that
//! encoding, so equal values always share one key.
//!
//! # Backends
//!
//! Physical storage implements the narrow [`Backend`] trait:
//!
//! - [`MemoryBackend`] -- map-based store for tests and embedding
//! - [`FsBackend`] -- loose objects on disk, optionally zstd-compressed
//! - [`Mux`] -- routes contents, nodes and commits to three backends
//!
//! [`BlockStore`] wraps a backend with key derivation, the tagged codec and
//! typed accessors.
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written.
//! 2. Writes are write-if-absent, so concurrent writers never conflict.
//! 3. Blocks reference each other by key, never by embedding.
//! 4. All I/O errors are propagated, never retried here.

pub mod block;
pub mod config;
pub mod contents;
pub mod error;
pub mod fs;
pub mod memory;
pub mod mux;
pub mod store;
pub mod traits;

pub use block::{key_of, Block, BlockKind, Commit, CommitInfo, Node};
pub use config::{BackendConfig, StoreConfig};
pub use contents::Contents;
pub use error::{StoreError, StoreResult};
pub use fs::FsBackend;
pub use memory::MemoryBackend;
pub use mux::Mux;
pub use store::BlockStore;
pub use traits::Backend;
