//! Content hashing for the Arbor tree store.
//!
//! Keys are domain-separated BLAKE3 digests of a block's encoding. The hash
//! function wraps an established library; no custom cryptography.

pub mod hasher;

pub use hasher::ContentHasher;
