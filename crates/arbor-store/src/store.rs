//! The block store: one content-addressed key space over a [`Backend`].
//!
//! [`BlockStore::new`] turns any append-only backend into a full block store
//! by supplying key derivation, the tagged codec and typed dispatch.
//! [`BlockStore::mux`] does the same over three kind-partitioned backends.

use arbor_types::Key;
use tracing::{debug, trace};

use crate::block::{key_of, Block, BlockKind, Commit, Node};
use crate::contents::{mismatch, Contents};
use crate::error::{StoreError, StoreResult};
use crate::mux::Mux;
use crate::traits::Backend;

/// Typed, content-addressed store of [`Block`]s.
#[derive(Debug)]
pub struct BlockStore<B> {
    backend: B,
    verify_reads: bool,
}

impl<B: Backend> BlockStore<B> {
    /// Build a block store over a single backend.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            verify_reads: false,
        }
    }

    /// Re-hash every block read and fail with [`StoreError::HashMismatch`]
    /// when the bytes do not match their key.
    pub fn with_verified_reads(mut self, verify: bool) -> Self {
        self.verify_reads = verify;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ---------------------------------------------------------------
    // Untyped access
    // ---------------------------------------------------------------

    /// Persist a block, returning its key. Write-once: a block that is
    /// already present is not written again.
    pub async fn add(&self, block: &Block) -> StoreResult<Key> {
        let bytes = block.encode()?;
        let key = key_of(&bytes);
        if self.backend.mem(&key).await? {
            trace!(key = %key.short_hex(), kind = %block.kind(), "block already present");
            return Ok(key);
        }

        let stored = self.backend.add(&bytes).await?;
        if stored != key {
            return Err(StoreError::HashMismatch {
                key: stored,
                computed: key,
            });
        }
        debug!(key = %key.short_hex(), kind = %block.kind(), bytes = bytes.len(), "added block");
        Ok(key)
    }

    /// Read and decode the block stored under `key`.
    pub async fn read(&self, key: &Key) -> StoreResult<Option<Block>> {
        match self.backend.read(key).await? {
            Some(bytes) => self.decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`read`](Self::read) but fails with [`StoreError::NotFound`].
    pub async fn find(&self, key: &Key) -> StoreResult<Block> {
        self.read(key).await?.ok_or(StoreError::NotFound(*key))
    }

    pub async fn mem(&self, key: &Key) -> StoreResult<bool> {
        self.backend.mem(key).await
    }

    pub async fn list(&self) -> StoreResult<Vec<Key>> {
        self.backend.list().await
    }

    fn decode(&self, key: &Key, bytes: &[u8]) -> StoreResult<Block> {
        if self.verify_reads {
            let computed = key_of(bytes);
            if computed != *key {
                return Err(StoreError::HashMismatch {
                    key: *key,
                    computed,
                });
            }
        }
        Block::decode(bytes)
    }

    /// Read and decode a block through the backend's per-kind route. The
    /// caller checks the decoded kind.
    async fn read_routed(&self, key: &Key, kind: BlockKind) -> StoreResult<Option<Block>> {
        match self.backend.read_kind(key, kind).await? {
            Some(bytes) => self.decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Typed access
    // ---------------------------------------------------------------

    pub async fn add_contents<C: Contents>(&self, contents: &C) -> StoreResult<Key> {
        self.add(&contents.to_block()).await
    }

    /// Read a contents value; fails with [`StoreError::TypeMismatch`] if the
    /// block under `key` is not of `C`'s kind.
    pub async fn read_contents<C: Contents>(&self, key: &Key) -> StoreResult<Option<C>> {
        match self.read_routed(key, C::KIND).await? {
            Some(block) => C::from_block(key, block).map(Some),
            None => Ok(None),
        }
    }

    pub async fn add_node(&self, node: &Node) -> StoreResult<Key> {
        self.add(&Block::Node(node.clone())).await
    }

    /// Read a node. The canonical empty node resolves under its key whether
    /// or not it was ever written.
    pub async fn read_node(&self, key: &Key) -> StoreResult<Option<Node>> {
        match self.read_routed(key, BlockKind::Node).await? {
            Some(Block::Node(node)) => Ok(Some(node)),
            Some(other) => Err(mismatch(key, BlockKind::Node, &other)),
            None => {
                let empty = Node::empty();
                if *key == empty.key()? {
                    trace!(key = %key.short_hex(), "empty node resolved without a read");
                    Ok(Some(empty))
                } else {
                    Ok(None)
                }
            }
        }
    }

    pub async fn add_commit(&self, commit: &Commit) -> StoreResult<Key> {
        self.add(&Block::Commit(commit.clone())).await
    }

    pub async fn read_commit(&self, key: &Key) -> StoreResult<Option<Commit>> {
        match self.read_routed(key, BlockKind::Commit).await? {
            Some(Block::Commit(commit)) => Ok(Some(commit)),
            Some(other) => Err(mismatch(key, BlockKind::Commit, &other)),
            None => Ok(None),
        }
    }
}

impl<C, N, M> BlockStore<Mux<C, N, M>>
where
    C: Backend,
    N: Backend,
    M: Backend,
{
    /// Build a block store whose value kinds live in separate backends.
    pub fn mux(contents: C, nodes: N, commits: M) -> Self {
        Self::new(Mux::new(contents, nodes, commits))
    }
}
