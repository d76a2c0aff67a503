use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::fs::FsBackend;
use crate::memory::MemoryBackend;
use crate::mux::Mux;
use crate::store::BlockStore;
use crate::traits::Backend;

/// Configuration for opening a block store.
///
/// ```toml
/// verify_reads = true
///
/// [backend]
/// kind = "filesystem"
/// root = ".arbor"
/// compression_level = 3
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Re-hash every block on read.
    pub verify_reads: bool,
    /// Physical storage layout.
    pub backend: BackendConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            verify_reads: true,
            backend: BackendConfig::default(),
        }
    }
}

/// Which backend(s) hold the blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Volatile in-process storage.
    Memory,
    /// Loose objects under `root`.
    Filesystem {
        root: PathBuf,
        #[serde(default)]
        compression_level: Option<i32>,
    },
    /// One backend per value kind.
    Mux {
        contents: Box<BackendConfig>,
        nodes: Box<BackendConfig>,
        commits: Box<BackendConfig>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::Filesystem {
            root: PathBuf::from(".arbor"),
            compression_level: None,
        }
    }
}

impl BackendConfig {
    /// Instantiate the configured backend.
    pub fn open(&self) -> Arc<dyn Backend> {
        match self {
            Self::Memory => Arc::new(MemoryBackend::new()),
            Self::Filesystem {
                root,
                compression_level,
            } => Arc::new(FsBackend::new(root).with_compression(*compression_level)),
            Self::Mux {
                contents,
                nodes,
                commits,
            } => Arc::new(Mux::new(contents.open(), nodes.open(), commits.open())),
        }
    }
}

impl StoreConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(source: &str) -> StoreResult<Self> {
        toml::from_str(source).map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// A volatile configuration, convenient for tests.
    pub fn in_memory() -> Self {
        Self {
            verify_reads: true,
            backend: BackendConfig::Memory,
        }
    }

    /// Open the configured block store.
    pub fn open(&self) -> BlockStore<Arc<dyn Backend>> {
        BlockStore::new(self.backend.open()).with_verified_reads(self.verify_reads)
    }
}
