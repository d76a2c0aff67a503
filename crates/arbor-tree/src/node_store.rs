//! Path-addressed reads and rewrites over immutable nodes.
//!
//! A node's key depends on the keys of its children, so every rewrite at a
//! path re-persists the chain of ancestors from that path back up to the
//! root. Siblings off that chain are reused by key untouched.
//!
//! # Invariants
//!
//! - No stored node keeps an empty child: a child that becomes the canonical
//!   empty node is dropped from its parent's map. Structurally equal trees
//!   therefore always have equal keys.
//! - Contents are persisted before the node that references them, and every
//!   child before its parent.

use std::collections::BTreeMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use arbor_store::{Backend, BlockStore, Contents, Node, StoreError};
use arbor_types::{Key, Path, Step};
use tracing::{debug, trace};

use crate::error::{TreeError, TreeResult};

/// Tree operations over a [`BlockStore`], with leaf payloads of type `C`.
pub struct NodeStore<B, C> {
    blocks: Arc<BlockStore<B>>,
    _contents: PhantomData<fn() -> C>,
}

impl<B, C> Clone for NodeStore<B, C> {
    fn clone(&self) -> Self {
        Self {
            blocks: Arc::clone(&self.blocks),
            _contents: PhantomData,
        }
    }
}

impl<B, C> std::fmt::Debug for NodeStore<B, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeStore").finish_non_exhaustive()
    }
}

impl<B: Backend, C: Contents> NodeStore<B, C> {
    pub fn new(blocks: Arc<BlockStore<B>>) -> Self {
        Self {
            blocks,
            _contents: PhantomData,
        }
    }

    pub fn blocks(&self) -> &Arc<BlockStore<B>> {
        &self.blocks
    }

    // ---------------------------------------------------------------
    // Node values
    // ---------------------------------------------------------------

    /// The canonical empty node.
    pub fn empty(&self) -> Node {
        Node::empty()
    }

    /// Persist a node and return its key.
    pub async fn add(&self, node: &Node) -> TreeResult<Key> {
        Ok(self.blocks.add_node(node).await?)
    }

    pub async fn read(&self, key: &Key) -> TreeResult<Option<Node>> {
        Ok(self.blocks.read_node(key).await?)
    }

    /// Read a node that some other stored node references.
    pub async fn read_exn(&self, key: &Key) -> TreeResult<Node> {
        self.read(key)
            .await?
            .ok_or(TreeError::Store(StoreError::NotFound(*key)))
    }

    /// Persist `contents` and a node holding only it.
    pub async fn leaf(&self, contents: &C) -> TreeResult<Node> {
        let contents = self.blocks.add_contents(contents).await?;
        let node = Node::leaf(contents);
        self.add(&node).await?;
        Ok(node)
    }

    /// Persist a node with the given contents and children.
    pub async fn create(
        &self,
        contents: Option<&C>,
        children: BTreeMap<Step, Key>,
    ) -> TreeResult<(Key, Node)> {
        let contents = match contents {
            Some(c) => Some(self.blocks.add_contents(c).await?),
            None => None,
        };
        let node = Node::new(contents, children);
        let key = self.add(&node).await?;
        Ok((key, node))
    }

    /// The leaf payload of `node`, if any.
    pub async fn contents(&self, node: &Node) -> TreeResult<Option<C>> {
        match node.contents() {
            Some(key) => {
                let contents = self
                    .blocks
                    .read_contents::<C>(key)
                    .await?
                    .ok_or(StoreError::NotFound(*key))?;
                Ok(Some(contents))
            }
            None => Ok(None),
        }
    }

    pub async fn contents_exn(&self, node: &Node) -> TreeResult<C> {
        self.contents(node).await?.ok_or(TreeError::NotFound {
            path: Path::empty(),
        })
    }

    /// The children of `node`, resolved to node values only on demand.
    pub fn succ<'a>(&'a self, node: &'a Node) -> impl Iterator<Item = (&'a Step, Child<'a, B, C>)> {
        node.children().iter().map(move |(step, key)| {
            (
                step,
                Child {
                    store: self,
                    key: *key,
                },
            )
        })
    }

    // ---------------------------------------------------------------
    // Path reads
    // ---------------------------------------------------------------

    /// Resolve `path` from `root` by repeated child lookup. The empty path
    /// resolves to `root` itself.
    pub async fn sub(&self, root: &Node, path: &Path) -> TreeResult<Option<Node>> {
        let mut current = root.clone();
        for step in path {
            let Some(key) = current.child(step).copied() else {
                return Ok(None);
            };
            current = self.read_exn(&key).await?;
        }
        Ok(Some(current))
    }

    pub async fn sub_exn(&self, root: &Node, path: &Path) -> TreeResult<Node> {
        self.sub(root, path)
            .await?
            .ok_or_else(|| TreeError::NotFound { path: path.clone() })
    }

    /// The leaf payload at `path`.
    pub async fn find(&self, root: &Node, path: &Path) -> TreeResult<Option<C>> {
        match self.sub(root, path).await? {
            Some(node) => self.contents(&node).await,
            None => Ok(None),
        }
    }

    pub async fn find_exn(&self, root: &Node, path: &Path) -> TreeResult<C> {
        self.find(root, path)
            .await?
            .ok_or_else(|| TreeError::NotFound { path: path.clone() })
    }

    /// `true` iff a non-empty node exists at `path`.
    pub async fn valid(&self, root: &Node, path: &Path) -> TreeResult<bool> {
        Ok(self
            .sub(root, path)
            .await?
            .is_some_and(|node| !node.is_empty()))
    }

    /// The child steps of the node at `path`, in order.
    pub async fn list(&self, root: &Node, path: &Path) -> TreeResult<Vec<Step>> {
        Ok(self
            .sub(root, path)
            .await?
            .map(|node| node.children().keys().cloned().collect())
            .unwrap_or_default())
    }

    // ---------------------------------------------------------------
    // Path rewrites
    // ---------------------------------------------------------------

    /// Set the leaf payload at `path`, creating intermediate nodes as needed.
    /// Returns the new root; updating with the value already present returns
    /// a root equal to the input.
    pub async fn update(&self, root: &Node, path: &Path, contents: &C) -> TreeResult<Node> {
        let key = self.blocks.add_contents(contents).await?;
        self.rewrite(root, path, move |mut node| async move {
            node.set_contents(Some(key));
            Ok(node)
        })
        .await
    }

    /// Replace the subtree at `path` by `f` of it. A missing subtree is
    /// passed to `f` as the empty node.
    pub async fn map<F, Fut>(&self, root: &Node, path: &Path, f: F) -> TreeResult<Node>
    where
        F: FnOnce(Node) -> Fut + Send,
        Fut: Future<Output = TreeResult<Node>> + Send,
    {
        self.rewrite(root, path, f).await
    }

    /// Drop the subtree at `path`. Ancestors left empty are pruned too.
    pub async fn remove(&self, root: &Node, path: &Path) -> TreeResult<Node> {
        self.rewrite(root, path, |_| async { Ok(Node::empty()) })
            .await
    }

    async fn rewrite<F, Fut>(&self, root: &Node, path: &Path, f: F) -> TreeResult<Node>
    where
        F: FnOnce(Node) -> Fut + Send,
        Fut: Future<Output = TreeResult<Node>> + Send,
    {
        // Walk down, remembering every ancestor and the step taken from it.
        let mut ancestors: Vec<(Node, &Step)> = Vec::with_capacity(path.len());
        let mut current = root.clone();
        for step in path {
            let child = match current.child(step) {
                Some(key) => self.read_exn(key).await?,
                None => Node::empty(),
            };
            ancestors.push((current, step));
            current = child;
        }

        let replacement = f(current.clone()).await?;
        if replacement == current {
            trace!(path = %path, "rewrite is a no-op");
            return Ok(root.clone());
        }

        // Rebuild bottom-up; each parent's key depends on its new child key.
        let mut child = replacement;
        for (mut parent, step) in ancestors.into_iter().rev() {
            let child_key = if child.is_empty() {
                None
            } else {
                Some(self.add(&child).await?)
            };
            parent.set_child(step.clone(), child_key);
            child = parent;
        }

        let key = self.add(&child).await?;
        debug!(path = %path, root = %key.short_hex(), "rewrote tree");
        Ok(child)
    }
}

/// A child reference yielded by [`NodeStore::succ`].
pub struct Child<'a, B, C> {
    store: &'a NodeStore<B, C>,
    key: Key,
}

impl<B: Backend, C: Contents> Child<'_, B, C> {
    pub fn key(&self) -> &Key {
        &self.key
    }

    /// Read the child node from the store.
    pub async fn get(&self) -> TreeResult<Node> {
        self.store.read_exn(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_store::MemoryBackend;
    use proptest::prelude::*;

    type Store = NodeStore<MemoryBackend, String>;

    fn store() -> Store {
        NodeStore::new(Arc::new(BlockStore::new(MemoryBackend::new())))
    }

    fn path(s: &str) -> Path {
        Path::of_hum(s)
    }

    fn text(s: &str) -> String {
        s.to_string()
    }

    #[tokio::test]
    async fn update_then_find() {
        let store = store();
        let root = store
            .update(&store.empty(), &path("/a/b/c"), &text("x"))
            .await
            .unwrap();
        assert_eq!(
            store.find(&root, &path("/a/b/c")).await.unwrap(),
            Some(text("x"))
        );
        assert_eq!(store.find(&root, &path("/a/b")).await.unwrap(), None);
        assert_eq!(store.find(&root, &path("/zzz")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_at_empty_path_sets_root_contents() {
        let store = store();
        let root = store
            .update(&store.empty(), &Path::empty(), &text("top"))
            .await
            .unwrap();
        assert_eq!(store.contents_exn(&root).await.unwrap(), "top");
        assert!(root.is_leaf());
    }

    #[tokio::test]
    async fn update_replaces_existing_contents() {
        let store = store();
        let p = path("/k");
        let first = store.update(&store.empty(), &p, &text("1")).await.unwrap();
        let second = store.update(&first, &p, &text("2")).await.unwrap();
        assert_eq!(store.find(&second, &p).await.unwrap(), Some(text("2")));
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let store = store();
        let p = path("/a/b");
        let once = store.update(&store.empty(), &p, &text("v")).await.unwrap();
        let twice = store.update(&once, &p, &text("v")).await.unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.key().unwrap(), twice.key().unwrap());
    }

    #[tokio::test]
    async fn updates_persist_every_ancestor() {
        let store = store();
        let root = store
            .update(&store.empty(), &path("/a/b"), &text("v"))
            .await
            .unwrap();
        let a = root.child(&Step::new("a").unwrap()).unwrap();
        let a_node = store.read(a).await.unwrap().unwrap();
        let b = a_node.child(&Step::new("b").unwrap()).unwrap();
        assert!(store.read(b).await.unwrap().unwrap().is_leaf());
        assert!(store.read(&root.key().unwrap()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn disjoint_update_shares_sibling_subtree() {
        let store = store();
        let root = store
            .update(&store.empty(), &path("/left/x"), &text("1"))
            .await
            .unwrap();
        let root = store.update(&root, &path("/right/y"), &text("2")).await.unwrap();
        let left = Step::new("left").unwrap();
        let before = *root.child(&left).unwrap();

        let after_root = store.update(&root, &path("/right/z"), &text("3")).await.unwrap();
        assert_eq!(*after_root.child(&left).unwrap(), before);
        assert_ne!(
            after_root.child(&Step::new("right").unwrap()),
            root.child(&Step::new("right").unwrap())
        );
    }

    #[tokio::test]
    async fn equal_trees_built_in_different_orders_share_a_key() {
        let store = store();
        let one = store.update(&store.empty(), &path("/a"), &text("1")).await.unwrap();
        let one = store.update(&one, &path("/b"), &text("2")).await.unwrap();

        let two = store.update(&store.empty(), &path("/b"), &text("2")).await.unwrap();
        let two = store.update(&two, &path("/a"), &text("1")).await.unwrap();

        assert_eq!(one.key().unwrap(), two.key().unwrap());
    }

    #[tokio::test]
    async fn remove_then_find_is_none() {
        let store = store();
        let p = path("/a/b");
        let root = store.update(&store.empty(), &p, &text("c")).await.unwrap();
        let removed = store.remove(&root, &p).await.unwrap();
        assert_eq!(store.find(&removed, &p).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_prunes_empty_ancestors() {
        let store = store();
        let root = store
            .update(&store.empty(), &path("/a/b/c"), &text("deep"))
            .await
            .unwrap();
        let removed = store.remove(&root, &path("/a/b/c")).await.unwrap();
        assert!(removed.is_empty());
        assert_eq!(removed.key().unwrap(), Node::empty().key().unwrap());
        assert!(!store.valid(&removed, &path("/a")).await.unwrap());
    }

    #[tokio::test]
    async fn remove_keeps_siblings() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a/x"), &text("1")).await.unwrap();
        let root = store.update(&root, &path("/a/y"), &text("2")).await.unwrap();
        let removed = store.remove(&root, &path("/a/x")).await.unwrap();
        assert_eq!(
            store.list(&removed, &path("/a")).await.unwrap(),
            vec![Step::new("y").unwrap()]
        );
    }

    #[tokio::test]
    async fn remove_missing_path_is_a_no_op() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a"), &text("1")).await.unwrap();
        let same = store.remove(&root, &path("/nope/deeper")).await.unwrap();
        assert_eq!(same, root);
    }

    #[tokio::test]
    async fn remove_empty_path_clears_everything() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a"), &text("1")).await.unwrap();
        assert!(store.remove(&root, &Path::empty()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn map_transforms_subtree() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a/b"), &text("old")).await.unwrap();

        let inner = store.clone();
        let mapped = store
            .map(&root, &path("/a"), move |node| async move {
                let leaf = inner.leaf(&text("new")).await?;
                let mut node = node;
                node.set_child(Step::new("c")?, Some(leaf.key()?));
                Ok(node)
            })
            .await
            .unwrap();

        assert_eq!(
            store.find(&mapped, &path("/a/b")).await.unwrap(),
            Some(text("old"))
        );
        assert_eq!(
            store.find(&mapped, &path("/a/c")).await.unwrap(),
            Some(text("new"))
        );
    }

    #[tokio::test]
    async fn map_to_empty_prunes() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a/b"), &text("x")).await.unwrap();
        let mapped = store
            .map(&root, &path("/a"), |_| async { Ok(Node::empty()) })
            .await
            .unwrap();
        assert!(mapped.is_empty());
    }

    #[tokio::test]
    async fn sub_of_empty_path_is_root() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a"), &text("1")).await.unwrap();
        assert_eq!(store.sub(&root, &Path::empty()).await.unwrap(), Some(root));
    }

    #[tokio::test]
    async fn strict_lookups_report_not_found() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a"), &text("1")).await.unwrap();

        let err = store.sub_exn(&root, &path("/b")).await.unwrap_err();
        assert!(matches!(err, TreeError::NotFound { path: p } if p == path("/b")));

        let err = store.find_exn(&root, &Path::empty()).await.unwrap_err();
        assert!(matches!(err, TreeError::NotFound { .. }));

        let err = store.contents_exn(&store.empty()).await.unwrap_err();
        assert!(matches!(err, TreeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn valid_distinguishes_empty() {
        let store = store();
        let root = store.update(&store.empty(), &path("/a/b"), &text("1")).await.unwrap();
        assert!(store.valid(&root, &path("/a")).await.unwrap());
        assert!(store.valid(&root, &path("/a/b")).await.unwrap());
        assert!(!store.valid(&root, &path("/a/c")).await.unwrap());
        assert!(!store.valid(&store.empty(), &Path::empty()).await.unwrap());
    }

    #[tokio::test]
    async fn create_and_succ() {
        let store = store();
        let leaf = store.leaf(&text("child")).await.unwrap();
        let leaf_key = leaf.key().unwrap();
        let mut children = BTreeMap::new();
        children.insert(Step::new("kid").unwrap(), leaf_key);

        let (key, node) = store.create(Some(&text("self")), children).await.unwrap();
        assert_eq!(store.read(&key).await.unwrap(), Some(node.clone()));
        assert_eq!(store.contents(&node).await.unwrap(), Some(text("self")));

        let succ: Vec<_> = store.succ(&node).collect();
        assert_eq!(succ.len(), 1);
        assert_eq!(succ[0].0.as_str(), "kid");
        assert_eq!(succ[0].1.key(), &leaf_key);
        assert_eq!(succ[0].1.get().await.unwrap(), leaf);
    }

    #[tokio::test]
    async fn empty_key_reads_as_empty_node() {
        let store = store();
        let empty = store.empty().key().unwrap();
        assert_eq!(store.read(&empty).await.unwrap(), Some(Node::empty()));
        assert_eq!(store.read_exn(&empty).await.unwrap(), Node::empty());
        assert_eq!(store.read(&Key::from_hash([3; 32])).await.unwrap(), None);
    }

    #[tokio::test]
    async fn dangling_child_is_a_store_error() {
        let store = store();
        let mut node = Node::empty();
        node.set_child(Step::new("ghost").unwrap(), Some(Key::from_hash([1; 32])));
        let err = store.sub(&node, &path("/ghost")).await.unwrap_err();
        assert!(matches!(err, TreeError::Store(StoreError::NotFound(_))));
    }

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    fn steps() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::vec("[a-z]{1,3}", 1..5)
    }

    proptest! {
        #[test]
        fn update_is_visible_and_idempotent(steps in steps(), value in "[a-z0-9]{0,8}") {
            let p = Path::from_strs(steps).unwrap();
            let store = store();
            let (found, once, twice) = runtime().block_on(async {
                let once = store.update(&store.empty(), &p, &value).await.unwrap();
                let twice = store.update(&once, &p, &value).await.unwrap();
                (store.find(&once, &p).await.unwrap(), once, twice)
            });
            prop_assert_eq!(found, Some(value.clone()));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn remove_undoes_a_lone_update(steps in steps(), value in "[a-z0-9]{0,8}") {
            let p = Path::from_strs(steps).unwrap();
            let store = store();
            let (found, removed) = runtime().block_on(async {
                let root = store.update(&store.empty(), &p, &value).await.unwrap();
                let removed = store.remove(&root, &p).await.unwrap();
                (store.find(&removed, &p).await.unwrap(), removed)
            });
            prop_assert_eq!(found, None);
            prop_assert_eq!(removed, Node::empty());
        }

        #[test]
        fn disjoint_updates_commute(first in steps(), second in steps()) {
            prop_assume!(first != second);
            let (p, q) = (
                Path::from_strs(first).unwrap(),
                Path::from_strs(second).unwrap(),
            );
            let store = store();
            let (pq, qp) = runtime().block_on(async {
                let empty = store.empty();
                let pq = store.update(&empty, &p, &text("p")).await.unwrap();
                let pq = store.update(&pq, &q, &text("q")).await.unwrap();
                let qp = store.update(&empty, &q, &text("q")).await.unwrap();
                let qp = store.update(&qp, &p, &text("p")).await.unwrap();
                (pq.key().unwrap(), qp.key().unwrap())
            });
            prop_assert_eq!(pq, qp);
        }
    }
}
