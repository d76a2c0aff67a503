//! Self-referential trees: leaf contents are keys into the same store.
//!
//! A [`Rec`] store needs no separate contents store. A leaf can point at any
//! block already in the key space, including another tree's root, which
//! lets callers link subtrees together without copying them.

use arbor_store::{Backend, Block, Node, StoreError};
use arbor_types::{Key, Path};
use tracing::debug;

use crate::error::TreeResult;
use crate::node_store::NodeStore;

/// A node store whose contents are keys back into the same store.
pub type Rec<B> = NodeStore<B, Key>;

impl<B: Backend> NodeStore<B, Key> {
    /// Persist `target` and store its key as the contents at `path`.
    pub async fn link(&self, root: &Node, path: &Path, target: &Node) -> TreeResult<Node> {
        let target_key = self.add(target).await?;
        debug!(path = %path, target = %target_key.short_hex(), "linking subtree");
        self.update(root, path, &target_key).await
    }

    /// Read the block referenced by the key stored at `path`.
    pub async fn follow(&self, root: &Node, path: &Path) -> TreeResult<Option<Block>> {
        match self.find(root, path).await? {
            Some(target) => {
                let block = self
                    .blocks()
                    .read(&target)
                    .await?
                    .ok_or(StoreError::NotFound(target))?;
                Ok(Some(block))
            }
            None => Ok(None),
        }
    }

    /// Like [`follow`](Self::follow), requiring the target to be a node.
    pub async fn follow_node(&self, root: &Node, path: &Path) -> TreeResult<Option<Node>> {
        match self.find(root, path).await? {
            Some(target) => Ok(Some(self.read_exn(&target).await?)),
            None => Ok(None),
        }
    }
}
