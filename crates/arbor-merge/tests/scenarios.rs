//! End-to-end merge scenarios over a full store stack.

use std::sync::Arc;

use arbor_dag::History;
use arbor_merge::{CommitMerger, Conflict, MergeOutcome, NodeMerger};
use arbor_store::{Backend, BlockStore, CommitInfo, MemoryBackend, Mux, Node};
use arbor_tree::NodeStore;
use arbor_types::Path;
use proptest::prelude::*;

type Routed = Mux<MemoryBackend, MemoryBackend, MemoryBackend>;
type Store = NodeStore<Routed, String>;

fn store() -> Store {
    let blocks = BlockStore::mux(MemoryBackend::new(), MemoryBackend::new(), MemoryBackend::new());
    NodeStore::new(Arc::new(blocks))
}

fn path(steps: &[&str]) -> Path {
    Path::from_strs(steps.iter().copied()).unwrap()
}

#[tokio::test]
async fn independent_additions_under_a_shared_prefix_merge() {
    let store = store();
    let merger = NodeMerger::with_default(store.clone());

    let root = store.empty();
    let root1 = store.update(&root, &path(&["a", "b"]), &"x".to_string()).await.unwrap();
    let root2 = store.update(&root, &path(&["a", "c"]), &"y".to_string()).await.unwrap();

    let merged = match merger.merge(&root, &root1, &root2).await.unwrap() {
        MergeOutcome::Resolved(node) => node,
        MergeOutcome::Conflict(conflicts) => panic!("unexpected conflicts: {conflicts:?}"),
    };

    assert_eq!(
        store.find(&merged, &path(&["a", "b"])).await.unwrap(),
        Some("x".to_string())
    );
    assert_eq!(
        store.find(&merged, &path(&["a", "c"])).await.unwrap(),
        Some("y".to_string())
    );
}

#[tokio::test]
async fn merge_keys_accepts_the_unwritten_empty_root() {
    let store = store();
    let merger = NodeMerger::with_default(store.clone());
    let empty = store.empty().key().unwrap();
    assert!(!store.blocks().mem(&empty).await.unwrap());

    let root1 = store.update(&store.empty(), &path(&["a", "b"]), &"x".to_string()).await.unwrap();
    let root2 = store.update(&store.empty(), &path(&["a", "c"]), &"y".to_string()).await.unwrap();
    let (k1, k2) = (root1.key().unwrap(), root2.key().unwrap());

    let merged = merger
        .merge_keys(&empty, &k1, &k2)
        .await
        .unwrap()
        .resolved()
        .expect("disjoint additions merge cleanly");
    assert_eq!(store.find(&merged, &path(&["a", "b"])).await.unwrap(), Some("x".to_string()));
    assert_eq!(store.find(&merged, &path(&["a", "c"])).await.unwrap(), Some("y".to_string()));

    assert_eq!(
        merger.merge_keys(&empty, &empty, &k2).await.unwrap(),
        MergeOutcome::Resolved(root2)
    );
}

#[tokio::test]
async fn merge_of_identical_inputs_is_identity() {
    let store = store();
    let merger = NodeMerger::with_default(store.clone());
    let x = store.update(&store.empty(), &path(&["k"]), &"v".to_string()).await.unwrap();

    assert_eq!(merger.merge(&x, &x, &x).await.unwrap(), MergeOutcome::Resolved(x.clone()));

    let empty = store.empty();
    assert_eq!(
        merger.merge(&empty, &empty, &empty).await.unwrap(),
        MergeOutcome::Resolved(Node::empty())
    );
}

#[tokio::test]
async fn one_sided_merge_returns_the_other_side() {
    let store = store();
    let merger = NodeMerger::with_default(store.clone());
    let ancestor = store.update(&store.empty(), &path(&["k"]), &"v".to_string()).await.unwrap();
    let b = store.update(&ancestor, &path(&["k", "deep"]), &"w".to_string()).await.unwrap();

    assert_eq!(
        merger.merge(&ancestor, &ancestor, &b).await.unwrap(),
        MergeOutcome::Resolved(b)
    );
}

#[tokio::test]
async fn divergent_leaf_reports_all_three_sides() {
    let store = store();
    let merger = NodeMerger::with_default(store.clone());
    let p = path(&["doc"]);
    let ancestor = store.update(&store.empty(), &p, &"A".to_string()).await.unwrap();
    let left = store.update(&ancestor, &p, &"B".to_string()).await.unwrap();
    let right = store.update(&ancestor, &p, &"C".to_string()).await.unwrap();

    let outcome = merger.merge(&ancestor, &left, &right).await.unwrap();
    assert_eq!(
        outcome,
        MergeOutcome::Conflict(vec![Conflict::new(
            Some("A".into()),
            Some("B".into()),
            Some("C".into())
        )
        .with_path(p)])
    );
}

#[tokio::test]
async fn commit_merge_routes_blocks_by_kind() {
    let contents = MemoryBackend::new();
    let nodes = MemoryBackend::new();
    let commits = MemoryBackend::new();
    let blocks = Arc::new(BlockStore::mux(contents, nodes, commits));
    let store: Store = NodeStore::new(Arc::clone(&blocks));
    let history = History::new(Arc::clone(&blocks));
    let merger = CommitMerger::new(history.clone(), NodeMerger::with_default(store.clone()));

    let base_tree = store.update(&store.empty(), &path(&["a", "b"]), &"x".to_string()).await.unwrap();
    let base_key = store.add(&base_tree).await.unwrap();
    let base = history.commit(base_key, [], CommitInfo::new("ann", "base", 1)).await.unwrap();

    let left_tree = store.update(&base_tree, &path(&["a", "c"]), &"y".to_string()).await.unwrap();
    let left = history
        .commit(store.add(&left_tree).await.unwrap(), [base], CommitInfo::new("ann", "left", 2))
        .await
        .unwrap();
    let right_tree = store.update(&base_tree, &path(&["d"]), &"z".to_string()).await.unwrap();
    let right = history
        .commit(store.add(&right_tree).await.unwrap(), [base], CommitInfo::new("bo", "right", 3))
        .await
        .unwrap();

    let merged = merger
        .merge(&left, &right, CommitInfo::new("ann", "merge", 4))
        .await
        .unwrap()
        .resolved()
        .expect("disjoint edits merge cleanly");

    assert_eq!(history.lca(&left, &right).await.unwrap(), Some(base));
    assert_eq!(history.generation(&merged).await.unwrap(), 2);

    let commit = history.read_exn(&merged).await.unwrap();
    let tree = store.read_exn(&commit.tree).await.unwrap();
    for (p, v) in [(&["a", "b"][..], "x"), (&["a", "c"][..], "y"), (&["d"][..], "z")] {
        assert_eq!(store.find(&tree, &path(p)).await.unwrap(), Some(v.to_string()));
    }

    let mux = blocks.backend();
    assert!(mux.commits().mem(&merged).await.unwrap());
    assert!(!mux.nodes().mem(&merged).await.unwrap());
    assert!(mux.nodes().mem(&commit.tree).await.unwrap());
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// A small tree: up to four entries with paths of one to three steps.
fn entries() -> impl Strategy<Value = Vec<(Vec<String>, String)>> {
    proptest::collection::vec(
        (proptest::collection::vec("[a-c]{1,2}", 1..4), "[a-z]{1,3}"),
        0..5,
    )
}

async fn build(store: &Store, entries: Vec<(Vec<String>, String)>) -> Node {
    let mut root = store.empty();
    for (steps, value) in entries {
        root = store.update(&root, &Path::from_strs(steps).unwrap(), &value).await.unwrap();
    }
    root
}

proptest! {
    #[test]
    fn merging_a_tree_with_itself_is_identity(entries in entries()) {
        let store = store();
        let merger = NodeMerger::with_default(store.clone());
        let (tree, outcome) = runtime().block_on(async {
            let tree = build(&store, entries).await;
            let outcome = merger.merge(&tree, &tree, &tree).await.unwrap();
            (tree, outcome)
        });
        prop_assert_eq!(outcome, MergeOutcome::Resolved(tree));
    }

    #[test]
    fn unchanged_side_yields_the_other(base in entries(), edits in entries()) {
        let store = store();
        let merger = NodeMerger::with_default(store.clone());
        let (changed, left_only, right_only) = runtime().block_on(async {
            let ancestor = build(&store, base).await;
            let mut changed = ancestor.clone();
            for (steps, value) in edits {
                let p = Path::from_strs(steps).unwrap();
                changed = store.update(&changed, &p, &value).await.unwrap();
            }
            let left_only = merger.merge(&ancestor, &changed, &ancestor).await.unwrap();
            let right_only = merger.merge(&ancestor, &ancestor, &changed).await.unwrap();
            (changed, left_only, right_only)
        });
        prop_assert_eq!(left_only, MergeOutcome::Resolved(changed.clone()));
        prop_assert_eq!(right_only, MergeOutcome::Resolved(changed));
    }
}
