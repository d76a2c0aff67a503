use std::collections::{BTreeMap, BTreeSet};

use arbor_crypto::ContentHasher;
use arbor_types::{Key, Step};
use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of a stored block, written as the leading tag byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Opaque leaf payload.
    Contents,
    /// Tree node: optional contents key plus child keys.
    Node,
    /// History entry: tree key plus parent commit keys.
    Commit,
    /// A bare reference to another block.
    Key,
}

impl BlockKind {
    /// The tag byte that prefixes every encoded block of this kind.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Contents => 0,
            Self::Node => 1,
            Self::Commit => 2,
            Self::Key => 3,
        }
    }

    /// Parse a tag byte.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Contents),
            1 => Some(Self::Node),
            2 => Some(Self::Commit),
            3 => Some(Self::Key),
            _ => None,
        }
    }

    /// Read the kind from the first byte of an encoded block.
    pub fn of_encoded(bytes: &[u8]) -> StoreResult<Self> {
        let tag = *bytes
            .first()
            .ok_or_else(|| StoreError::Codec("empty block".into()))?;
        Self::from_tag(tag).ok_or_else(|| StoreError::Codec(format!("unknown block tag {tag}")))
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Contents => write!(f, "contents"),
            Self::Node => write!(f, "node"),
            Self::Commit => write!(f, "commit"),
            Self::Key => write!(f, "key"),
        }
    }
}

/// Derive the key of an already-encoded block.
pub fn key_of(encoded: &[u8]) -> Key {
    ContentHasher::BLOCK.hash(encoded)
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A tree value: optional leaf contents plus child references.
///
/// Children are held by key and kept in a `BTreeMap`, so the encoding (and
/// therefore the key) of a node is fully determined by its content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    contents: Option<Key>,
    children: BTreeMap<Step, Key>,
}

impl Node {
    /// The canonical empty node: no contents, no children.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A node holding only `contents`.
    pub fn leaf(contents: Key) -> Self {
        Self {
            contents: Some(contents),
            children: BTreeMap::new(),
        }
    }

    pub fn new(contents: Option<Key>, children: BTreeMap<Step, Key>) -> Self {
        Self { contents, children }
    }

    pub fn contents(&self) -> Option<&Key> {
        self.contents.as_ref()
    }

    pub fn children(&self) -> &BTreeMap<Step, Key> {
        &self.children
    }

    pub fn child(&self, step: &Step) -> Option<&Key> {
        self.children.get(step)
    }

    /// Returns `true` for the canonical empty node.
    pub fn is_empty(&self) -> bool {
        self.contents.is_none() && self.children.is_empty()
    }

    /// Returns `true` if the node has contents and no children.
    pub fn is_leaf(&self) -> bool {
        self.contents.is_some() && self.children.is_empty()
    }

    /// Replace the contents slot.
    pub fn set_contents(&mut self, contents: Option<Key>) {
        self.contents = contents;
    }

    /// Point `step` at `child`, or drop the entry when `child` is `None`.
    pub fn set_child(&mut self, step: Step, child: Option<Key>) {
        match child {
            Some(key) => {
                self.children.insert(step, key);
            }
            None => {
                self.children.remove(&step);
            }
        }
    }

    /// Key of this node, computed without touching any store.
    pub fn key(&self) -> StoreResult<Key> {
        Block::Node(self.clone()).key()
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// Descriptive metadata carried by a commit.
///
/// `date` is supplied by the caller; it takes part in the encoding, so two
/// commits differing only in date have different keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub author: String,
    pub message: String,
    /// Seconds since the Unix epoch.
    pub date: u64,
}

impl CommitInfo {
    pub fn new(author: impl Into<String>, message: impl Into<String>, date: u64) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            date,
        }
    }
}

/// A history entry: a tree root plus the commits it was derived from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub tree: Key,
    pub parents: BTreeSet<Key>,
    pub info: CommitInfo,
}

impl Commit {
    pub fn new(tree: Key, parents: impl IntoIterator<Item = Key>, info: CommitInfo) -> Self {
        Self {
            tree,
            parents: parents.into_iter().collect(),
            info,
        }
    }

    /// Returns `true` if this commit has no parents.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    /// Returns `true` if this commit joins two or more histories.
    pub fn is_merge(&self) -> bool {
        self.parents.len() >= 2
    }

    /// Key of this commit, computed without touching any store.
    pub fn key(&self) -> StoreResult<Key> {
        Block::Commit(self.clone()).key()
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// Fixed-width little-endian bincode. Decoding rejects trailing bytes so
/// each stored node or commit has exactly one accepted encoding.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// The unit ever written to a backend.
///
/// Encoded as one tag byte followed by the payload: raw bytes for contents,
/// bincode for nodes and commits, 32 raw bytes for keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    Contents(Vec<u8>),
    Node(Node),
    Commit(Commit),
    Key(Key),
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        match self {
            Self::Contents(_) => BlockKind::Contents,
            Self::Node(_) => BlockKind::Node,
            Self::Commit(_) => BlockKind::Commit,
            Self::Key(_) => BlockKind::Key,
        }
    }

    /// Deterministic tagged encoding.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut out = vec![self.kind().tag()];
        match self {
            Self::Contents(data) => out.extend_from_slice(data),
            Self::Node(node) => codec().serialize_into(&mut out, node)?,
            Self::Commit(commit) => codec().serialize_into(&mut out, commit)?,
            Self::Key(key) => out.extend_from_slice(key.as_bytes()),
        }
        Ok(out)
    }

    /// Decode a block, dispatching on its tag byte.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        let kind = BlockKind::of_encoded(bytes)?;
        let payload = &bytes[1..];
        Ok(match kind {
            BlockKind::Contents => Self::Contents(payload.to_vec()),
            BlockKind::Node => Self::Node(codec().deserialize(payload)?),
            BlockKind::Commit => Self::Commit(codec().deserialize(payload)?),
            BlockKind::Key => Self::Key(
                Key::from_slice(payload).map_err(|e| StoreError::Codec(e.to_string()))?,
            ),
        })
    }

    /// Key of this block: the hash of its encoding.
    pub fn key(&self) -> StoreResult<Key> {
        Ok(key_of(&self.encode()?))
    }
}
