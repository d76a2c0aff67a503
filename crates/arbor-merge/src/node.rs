//! Structural three-way merge of trees.
//!
//! Subtrees are compared by key first, so unchanged regions are never
//! read. Only subtrees changed on both sides are descended into. A step
//! missing on one side merges against the canonical empty node, which
//! makes additions, deletions and modify/delete conflicts fall out of the
//! same rule.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use arbor_store::{Backend, Contents, Node};
use arbor_tree::NodeStore;
use arbor_types::{Key, Path, Step};
use tracing::{debug, trace, warn};

use crate::error::MergeResult;
use crate::outcome::{three_way, MergeOutcome};
use crate::resolver::{ContentsMerge, DefaultMerge};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Merges trees of `C` payloads, resolving leaf divergence with `R`.
pub struct NodeMerger<B, C, R = DefaultMerge> {
    store: NodeStore<B, C>,
    resolver: Arc<R>,
}

impl<B, C, R> Clone for NodeMerger<B, C, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl<B: Backend, C: Contents> NodeMerger<B, C, DefaultMerge> {
    /// A merger that reports every divergent payload as a conflict.
    pub fn with_default(store: NodeStore<B, C>) -> Self {
        Self::new(store, DefaultMerge)
    }
}

impl<B, C, R> NodeMerger<B, C, R>
where
    B: Backend,
    C: Contents,
    R: ContentsMerge<C>,
{
    pub fn new(store: NodeStore<B, C>, resolver: R) -> Self {
        Self {
            store,
            resolver: Arc::new(resolver),
        }
    }

    pub fn store(&self) -> &NodeStore<B, C> {
        &self.store
    }

    /// Merge `left` and `right` against their common `ancestor`.
    ///
    /// On success the merged root and every new node under it are
    /// persisted. On conflict nothing is reachable from a new root, and all
    /// conflicts found anywhere in the tree are returned.
    pub async fn merge(
        &self,
        ancestor: &Node,
        left: &Node,
        right: &Node,
    ) -> MergeResult<MergeOutcome<Node>> {
        let outcome = self
            .merge_at(Path::empty(), ancestor.clone(), left.clone(), right.clone())
            .await?;
        match &outcome {
            MergeOutcome::Resolved(node) => {
                let key = self.store.add(node).await?;
                debug!(root = %key.short_hex(), "merged trees");
            }
            MergeOutcome::Conflict(conflicts) => {
                for conflict in conflicts {
                    warn!(%conflict, "merge conflict");
                }
            }
        }
        Ok(outcome)
    }

    /// Merge the nodes stored under three keys.
    pub async fn merge_keys(
        &self,
        ancestor: &Key,
        left: &Key,
        right: &Key,
    ) -> MergeResult<MergeOutcome<Node>> {
        let ancestor = self.store.read_exn(ancestor).await?;
        let left = self.store.read_exn(left).await?;
        let right = self.store.read_exn(right).await?;
        self.merge(&ancestor, &left, &right).await
    }

    fn merge_at(
        &self,
        path: Path,
        ancestor: Node,
        left: Node,
        right: Node,
    ) -> BoxFuture<'_, MergeResult<MergeOutcome<Node>>> {
        Box::pin(async move {
            if let Some(node) = three_way(&ancestor, &left, &right) {
                return Ok(MergeOutcome::Resolved(node));
            }
            trace!(path = %path, "merging divergent node");

            let mut conflicts = Vec::new();

            let contents = match three_way(&ancestor.contents(), &left.contents(), &right.contents())
            {
                Some(key) => key.copied(),
                None => {
                    let a = self.store.contents(&ancestor).await?;
                    let l = self.store.contents(&left).await?;
                    let r = self.store.contents(&right).await?;
                    match self.resolver.merge(a.as_ref(), l.as_ref(), r.as_ref()) {
                        MergeOutcome::Resolved(Some(merged)) => {
                            Some(self.store.blocks().add_contents(&merged).await?)
                        }
                        MergeOutcome::Resolved(None) => None,
                        MergeOutcome::Conflict(found) => {
                            conflicts.extend(found.into_iter().map(|c| c.with_path(path.clone())));
                            None
                        }
                    }
                }
            };

            let steps: BTreeSet<&Step> = left
                .children()
                .keys()
                .chain(right.children().keys())
                .collect();
            let mut children = BTreeMap::new();
            for step in steps {
                let (a, l, r) = (ancestor.child(step), left.child(step), right.child(step));
                if let Some(key) = three_way(&a, &l, &r) {
                    if let Some(key) = key {
                        children.insert(step.clone(), *key);
                    }
                    continue;
                }

                let a = self.child(a).await?;
                let l = self.child(l).await?;
                let r = self.child(r).await?;
                match self.merge_at(path.clone().rcons(step.clone()), a, l, r).await? {
                    MergeOutcome::Resolved(node) if node.is_empty() => {}
                    MergeOutcome::Resolved(node) => {
                        children.insert(step.clone(), self.store.add(&node).await?);
                    }
                    MergeOutcome::Conflict(found) => conflicts.extend(found),
                }
            }

            if conflicts.is_empty() {
                Ok(MergeOutcome::Resolved(Node::new(contents, children)))
            } else {
                Ok(MergeOutcome::Conflict(conflicts))
            }
        })
    }

    async fn child(&self, key: Option<&Key>) -> MergeResult<Node> {
        Ok(match key {
            Some(key) => self.store.read_exn(key).await?,
            None => Node::empty(),
        })
    }
}
