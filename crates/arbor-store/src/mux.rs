use arbor_types::Key;
use async_trait::async_trait;
use tracing::trace;

use crate::block::BlockKind;
use crate::error::StoreResult;
use crate::traits::Backend;

/// One logical backend over three physical ones, one per value kind.
///
/// Contents blocks (and the key blocks of a self-referential store) go to
/// `contents`, nodes to `nodes`, commits to `commits`. Keys stay in a single
/// space because every partition derives keys from the same encoding.
pub struct Mux<C, N, M> {
    contents: C,
    nodes: N,
    commits: M,
}

impl<C, N, M> Mux<C, N, M>
where
    C: Backend,
    N: Backend,
    M: Backend,
{
    pub fn new(contents: C, nodes: N, commits: M) -> Self {
        Self {
            contents,
            nodes,
            commits,
        }
    }

    pub fn contents(&self) -> &C {
        &self.contents
    }

    pub fn nodes(&self) -> &N {
        &self.nodes
    }

    pub fn commits(&self) -> &M {
        &self.commits
    }

    fn route(&self, kind: BlockKind) -> &dyn Backend {
        match kind {
            BlockKind::Contents | BlockKind::Key => &self.contents,
            BlockKind::Node => &self.nodes,
            BlockKind::Commit => &self.commits,
        }
    }
}

#[async_trait]
impl<C, N, M> Backend for Mux<C, N, M>
where
    C: Backend,
    N: Backend,
    M: Backend,
{
    async fn read(&self, key: &Key) -> StoreResult<Option<Vec<u8>>> {
        // Nodes are read most often during path walks; try them first.
        if let Some(bytes) = self.nodes.read(key).await? {
            return Ok(Some(bytes));
        }
        if let Some(bytes) = self.commits.read(key).await? {
            return Ok(Some(bytes));
        }
        self.contents.read(key).await
    }

    async fn add(&self, bytes: &[u8]) -> StoreResult<Key> {
        let kind = BlockKind::of_encoded(bytes)?;
        trace!(%kind, "routing block");
        self.route(kind).add(bytes).await
    }

    async fn mem(&self, key: &Key) -> StoreResult<bool> {
        Ok(self.nodes.mem(key).await?
            || self.commits.mem(key).await?
            || self.contents.mem(key).await?)
    }

    async fn list(&self) -> StoreResult<Vec<Key>> {
        let mut keys = self.contents.list().await?;
        keys.extend(self.nodes.list().await?);
        keys.extend(self.commits.list().await?);
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn read_kind(&self, key: &Key, kind: BlockKind) -> StoreResult<Option<Vec<u8>>> {
        self.route(kind).read_kind(key, kind).await
    }
}

impl<C, N, M> std::fmt::Debug for Mux<C, N, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mux").finish_non_exhaustive()
    }
}
