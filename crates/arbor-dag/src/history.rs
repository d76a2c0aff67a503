//! The commit DAG and its traversal algorithms.
//!
//! # Invariants
//!
//! - Acyclic by construction: a commit can only name parents whose keys
//!   already exist, and keys are derived from finalized content.
//! - Every parent reference of a commit created here resolves.
//!
//! Generation numbers: a root commit has generation 0; any other commit is
//! one more than its highest parent.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use arbor_store::{Backend, BlockStore, Commit, CommitInfo};
use arbor_types::Key;
use tracing::debug;

use crate::error::{DagError, DagResult};

/// Commit history stored in a [`BlockStore`].
pub struct History<B> {
    blocks: Arc<BlockStore<B>>,
}

impl<B> Clone for History<B> {
    fn clone(&self) -> Self {
        Self {
            blocks: Arc::clone(&self.blocks),
        }
    }
}

impl<B: Backend> History<B> {
    pub fn new(blocks: Arc<BlockStore<B>>) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &Arc<BlockStore<B>> {
        &self.blocks
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Persist a commit of `tree` on top of `parents`.
    ///
    /// Every parent must already exist, and `tree` must resolve to a node (the
    /// canonical empty tree always does).
    pub async fn commit(
        &self,
        tree: Key,
        parents: impl IntoIterator<Item = Key>,
        info: CommitInfo,
    ) -> DagResult<Key> {
        let commit = Commit::new(tree, parents, info);

        for parent in &commit.parents {
            if self.blocks.read_commit(parent).await?.is_none() {
                return Err(DagError::DanglingParent { parent: *parent });
            }
        }

        if self.blocks.read_node(&tree).await?.is_none() {
            return Err(DagError::TreeNotFound(tree));
        }

        let key = self.blocks.add_commit(&commit).await?;
        debug!(
            commit = %key.short_hex(),
            tree = %tree.short_hex(),
            parents = commit.parents.len(),
            "added commit"
        );
        Ok(key)
    }

    pub async fn read(&self, key: &Key) -> DagResult<Option<Commit>> {
        Ok(self.blocks.read_commit(key).await?)
    }

    pub async fn read_exn(&self, key: &Key) -> DagResult<Commit> {
        self.read(key).await?.ok_or(DagError::CommitNotFound(*key))
    }

    // ---------------------------------------------------------------
    // Ancestry
    // ---------------------------------------------------------------

    /// All proper ancestors of `key`, nearest first (BFS over parents).
    pub async fn ancestors(&self, key: &Key) -> DagResult<Vec<Key>> {
        let start = self.read_exn(key).await?;
        let mut visited = HashSet::new();
        visited.insert(*key);
        let mut result = Vec::new();
        let mut queue: VecDeque<Key> = start.parents.iter().copied().collect();
        visited.extend(start.parents.iter().copied());

        while let Some(current) = queue.pop_front() {
            result.push(current);
            let commit = self.read_exn(&current).await?;
            for parent in &commit.parents {
                if visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }

        Ok(result)
    }

    /// `true` if `ancestor` is reachable from `descendant` (or equal to it).
    pub async fn is_ancestor(&self, ancestor: &Key, descendant: &Key) -> DagResult<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.ancestors(descendant).await?.contains(ancestor))
    }

    /// Longest distance from `key` down to a root commit.
    pub async fn generation(&self, key: &Key) -> DagResult<u64> {
        let mut graph = Ancestry::default();
        self.load_ancestry(key, &mut graph).await?;
        Ok(graph.generation(key))
    }

    /// The lowest common ancestor of `a` and `b`.
    ///
    /// Candidates are common ancestors that are not themselves ancestors of
    /// another common ancestor. Among several candidates (criss-cross
    /// histories) the one with the highest generation wins, then the highest
    /// key. Returns `None` when the histories are disjoint.
    pub async fn lca(&self, a: &Key, b: &Key) -> DagResult<Option<Key>> {
        if a == b {
            self.read_exn(a).await?;
            return Ok(Some(*a));
        }

        let mut graph = Ancestry::default();
        let from_a = self.load_ancestry(a, &mut graph).await?;
        let from_b = self.load_ancestry(b, &mut graph).await?;
        let common: HashSet<Key> = from_a.intersection(&from_b).copied().collect();
        if common.is_empty() {
            debug!(a = %a.short_hex(), b = %b.short_hex(), "histories are disjoint");
            return Ok(None);
        }

        // Everything strictly below some common ancestor is not lowest.
        let mut dominated = HashSet::new();
        let mut queue: VecDeque<Key> = common
            .iter()
            .flat_map(|key| graph.parents(key))
            .collect();
        while let Some(current) = queue.pop_front() {
            if dominated.insert(current) {
                queue.extend(graph.parents(&current));
            }
        }

        let best = common
            .into_iter()
            .filter(|key| !dominated.contains(key))
            .max_by_key(|key| (graph.generation(key), *key));

        if let Some(best) = &best {
            debug!(
                a = %a.short_hex(),
                b = %b.short_hex(),
                lca = %best.short_hex(),
                "found lowest common ancestor"
            );
        }
        Ok(best)
    }

    /// Load `start` and all its ancestors into `graph`; returns the set of
    /// keys reached, `start` included.
    async fn load_ancestry(&self, start: &Key, graph: &mut Ancestry) -> DagResult<HashSet<Key>> {
        let mut reached = HashSet::new();
        reached.insert(*start);
        let mut queue = VecDeque::from([*start]);

        while let Some(current) = queue.pop_front() {
            let parents = match graph.commits.get(&current) {
                Some(parents) => parents.clone(),
                None => {
                    let commit = self.read_exn(&current).await?;
                    let parents: Vec<Key> = commit.parents.into_iter().collect();
                    graph.commits.insert(current, parents.clone());
                    parents
                }
            };
            for parent in parents {
                if reached.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        Ok(reached)
    }
}

/// Parent lists of the commits loaded during one query.
#[derive(Default)]
struct Ancestry {
    commits: HashMap<Key, Vec<Key>>,
}

impl Ancestry {
    fn parents(&self, key: &Key) -> Vec<Key> {
        self.commits.get(key).cloned().unwrap_or_default()
    }

    /// Generation of `key`, computed iteratively over the loaded commits.
    fn generation(&self, key: &Key) -> u64 {
        let mut memo: HashMap<Key, u64> = HashMap::new();
        let mut stack = vec![*key];

        while let Some(&current) = stack.last() {
            if memo.contains_key(&current) {
                stack.pop();
                continue;
            }
            let parents = self.parents(&current);
            let pending: Vec<Key> = parents
                .iter()
                .filter(|p| !memo.contains_key(*p))
                .copied()
                .collect();
            if pending.is_empty() {
                let generation = parents
                    .iter()
                    .filter_map(|p| memo.get(p))
                    .max()
                    .map_or(0, |g| g + 1);
                memo.insert(current, generation);
                stack.pop();
            } else {
                stack.extend(pending);
            }
        }

        memo.get(key).copied().unwrap_or_default()
    }
}
