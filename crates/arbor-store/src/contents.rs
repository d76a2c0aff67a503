//! Leaf payload types and how they map onto blocks.

use std::fmt;

use arbor_types::Key;

use crate::block::{Block, BlockKind};
use crate::error::{StoreError, StoreResult};

/// A value that can be stored as the contents of a tree node.
pub trait Contents: Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Block kind used for this payload type.
    const KIND: BlockKind;

    fn to_block(&self) -> Block;

    /// Interpret a block read back from `key`.
    fn from_block(key: &Key, block: Block) -> StoreResult<Self>;

    /// Human-readable rendering used in merge conflict reports.
    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

pub(crate) fn mismatch(key: &Key, expected: BlockKind, block: &Block) -> StoreError {
    StoreError::TypeMismatch {
        key: *key,
        expected,
        actual: block.kind(),
    }
}

impl Contents for Vec<u8> {
    const KIND: BlockKind = BlockKind::Contents;

    fn to_block(&self) -> Block {
        Block::Contents(self.clone())
    }

    fn from_block(key: &Key, block: Block) -> StoreResult<Self> {
        match block {
            Block::Contents(data) => Ok(data),
            other => Err(mismatch(key, Self::KIND, &other)),
        }
    }

    fn describe(&self) -> String {
        String::from_utf8_lossy(self).into_owned()
    }
}

impl Contents for String {
    const KIND: BlockKind = BlockKind::Contents;

    fn to_block(&self) -> Block {
        Block::Contents(self.as_bytes().to_vec())
    }

    fn from_block(key: &Key, block: Block) -> StoreResult<Self> {
        match block {
            Block::Contents(data) => {
                String::from_utf8(data).map_err(|e| StoreError::Codec(e.to_string()))
            }
            other => Err(mismatch(key, Self::KIND, &other)),
        }
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

/// Counters are stored as 8 big-endian bytes.
impl Contents for i64 {
    const KIND: BlockKind = BlockKind::Contents;

    fn to_block(&self) -> Block {
        Block::Contents(self.to_be_bytes().to_vec())
    }

    fn from_block(key: &Key, block: Block) -> StoreResult<Self> {
        match block {
            Block::Contents(data) => {
                let bytes: [u8; 8] = data.as_slice().try_into().map_err(|_| {
                    StoreError::Codec(format!("counter must be 8 bytes, got {}", data.len()))
                })?;
                Ok(i64::from_be_bytes(bytes))
            }
            other => Err(mismatch(key, Self::KIND, &other)),
        }
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Keys as contents make a self-referential store: a leaf points back into
/// the same key space instead of at a separate payload.
impl Contents for Key {
    const KIND: BlockKind = BlockKind::Key;

    fn to_block(&self) -> Block {
        Block::Key(*self)
    }

    fn from_block(key: &Key, block: Block) -> StoreResult<Self> {
        match block {
            Block::Key(target) => Ok(target),
            other => Err(mismatch(key, Self::KIND, &other)),
        }
    }

    fn describe(&self) -> String {
        self.to_hex()
    }
}
