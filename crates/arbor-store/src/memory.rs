use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use arbor_types::Key;
use async_trait::async_trait;

use crate::block::key_of;
use crate::error::{StoreError, StoreResult};
use crate::traits::Backend;

/// In-memory, map-based backend.
///
/// Intended for tests and embedding. Encoded blocks are held behind an
/// `RwLock`; the lock is never held across an await point.
pub struct MemoryBackend {
    blocks: RwLock<BTreeMap<Key, Vec<u8>>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(BTreeMap::new()),
        }
    }

    fn blocks(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<Key, Vec<u8>>>> {
        self.blocks
            .read()
            .map_err(|_| StoreError::backend("memory backend lock poisoned"))
    }

    fn blocks_mut(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<Key, Vec<u8>>>> {
        self.blocks
            .write()
            .map_err(|_| StoreError::backend("memory backend lock poisoned"))
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.blocks()?.len())
    }

    /// Returns `true` if the backend holds no blocks.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.blocks()?.is_empty())
    }

    /// Total encoded bytes across all stored blocks.
    pub fn total_bytes(&self) -> StoreResult<u64> {
        Ok(self.blocks()?.values().map(|b| b.len() as u64).sum())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn read(&self, key: &Key) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.blocks()?.get(key).cloned())
    }

    async fn add(&self, bytes: &[u8]) -> StoreResult<Key> {
        let key = key_of(bytes);
        self.blocks_mut()?
            .entry(key)
            .or_insert_with(|| bytes.to_vec());
        Ok(key)
    }

    async fn mem(&self, key: &Key) -> StoreResult<bool> {
        Ok(self.blocks()?.contains_key(key))
    }

    async fn list(&self) -> StoreResult<Vec<Key>> {
        Ok(self.blocks()?.keys().copied().collect())
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("MemoryBackend")
            .field("block_count", &count)
            .finish()
    }
}
