use std::sync::Arc;

use arbor_types::Key;
use async_trait::async_trait;

use crate::block::BlockKind;
use crate::error::StoreResult;

/// Append-only, content-addressed byte store.
///
/// This is the whole contract the tree store needs from physical storage.
/// All implementations must satisfy these invariants:
/// - The key of a value is [`key_of`](crate::block::key_of) of its bytes.
/// - `add` is write-if-absent: adding bytes already present is a no-op that
///   returns the same key, so concurrent writers of equal bytes never conflict.
/// - Values are never modified once written.
/// - I/O failures are propagated, never retried or silently ignored.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the encoded block stored under `key`.
    ///
    /// Returns `Ok(None)` if nothing is stored there.
    async fn read(&self, key: &Key) -> StoreResult<Option<Vec<u8>>>;

    /// Persist encoded bytes and return their content-derived key.
    async fn add(&self, bytes: &[u8]) -> StoreResult<Key>;

    /// Check whether `key` is present.
    async fn mem(&self, key: &Key) -> StoreResult<bool>;

    /// Every key in the store. Intended for maintenance and export.
    async fn list(&self) -> StoreResult<Vec<Key>>;

    /// Read a block the caller expects to be of `kind`.
    ///
    /// Backends that partition by kind override this to skip probing the
    /// other partitions; the default ignores the hint.
    async fn read_kind(&self, key: &Key, kind: BlockKind) -> StoreResult<Option<Vec<u8>>> {
        let _ = kind;
        self.read(key).await
    }
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for Arc<T> {
    async fn read(&self, key: &Key) -> StoreResult<Option<Vec<u8>>> {
        (**self).read(key).await
    }

    async fn add(&self, bytes: &[u8]) -> StoreResult<Key> {
        (**self).add(bytes).await
    }

    async fn mem(&self, key: &Key) -> StoreResult<bool> {
        (**self).mem(key).await
    }

    async fn list(&self) -> StoreResult<Vec<Key>> {
        (**self).list().await
    }

    async fn read_kind(&self, key: &Key, kind: BlockKind) -> StoreResult<Option<Vec<u8>>> {
        (**self).read_kind(key, kind).await
    }
}
