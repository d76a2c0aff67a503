//! History merge: merge two commits' trees through their lowest common
//! ancestor and record the result as a merge commit.

use arbor_dag::History;
use arbor_store::{Backend, CommitInfo, Contents, Node};
use arbor_types::Key;
use tracing::{debug, warn};

use crate::error::MergeResult;
use crate::node::NodeMerger;
use crate::outcome::MergeOutcome;
use crate::resolver::{ContentsMerge, DefaultMerge};

/// Merges commits of one [`History`] using a [`NodeMerger`] for trees.
pub struct CommitMerger<B, C, R = DefaultMerge> {
    history: History<B>,
    nodes: NodeMerger<B, C, R>,
}

impl<B, C, R> CommitMerger<B, C, R>
where
    B: Backend,
    C: Contents,
    R: ContentsMerge<C>,
{
    /// Both halves must share one block store.
    pub fn new(history: History<B>, nodes: NodeMerger<B, C, R>) -> Self {
        Self { history, nodes }
    }

    pub fn history(&self) -> &History<B> {
        &self.history
    }

    /// Merge commit `right` into commit `left`.
    ///
    /// The ancestor tree is the tree of the lowest common ancestor, or the
    /// empty node when the histories are disjoint. Merging a commit with
    /// itself returns it unchanged; otherwise a successful merge persists a
    /// new commit with parents `{left, right}`.
    pub async fn merge(
        &self,
        left: &Key,
        right: &Key,
        info: CommitInfo,
    ) -> MergeResult<MergeOutcome<Key>> {
        if left == right {
            self.history.read_exn(left).await?;
            return Ok(MergeOutcome::Resolved(*left));
        }

        let left_commit = self.history.read_exn(left).await?;
        let right_commit = self.history.read_exn(right).await?;
        let store = self.nodes.store();

        let ancestor = match self.history.lca(left, right).await? {
            Some(base) => {
                let base = self.history.read_exn(&base).await?;
                store.read_exn(&base.tree).await?
            }
            None => Node::empty(),
        };
        let left_tree = store.read_exn(&left_commit.tree).await?;
        let right_tree = store.read_exn(&right_commit.tree).await?;

        match self.nodes.merge(&ancestor, &left_tree, &right_tree).await? {
            MergeOutcome::Resolved(tree) => {
                let tree = store.add(&tree).await?;
                let key = self.history.commit(tree, [*left, *right], info).await?;
                debug!(
                    left = %left.short_hex(),
                    right = %right.short_hex(),
                    commit = %key.short_hex(),
                    "merged commits"
                );
                Ok(MergeOutcome::Resolved(key))
            }
            MergeOutcome::Conflict(conflicts) => {
                warn!(
                    left = %left.short_hex(),
                    right = %right.short_hex(),
                    conflicts = conflicts.len(),
                    "commit merge has conflicts"
                );
                Ok(MergeOutcome::Conflict(conflicts))
            }
        }
    }
}
