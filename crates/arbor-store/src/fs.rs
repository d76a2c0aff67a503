//! Loose-object filesystem backend.
//!
//! Layout: `<root>/objects/<first 2 hex chars>/<remaining 62 hex chars>`.
//! Every file starts with a one-byte frame header (`0` raw, `1` zstd).
//! Writes go to a temporary file in the same fan-out directory and are
//! renamed into place, so readers never observe a partially written block.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use arbor_types::Key;
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::block::key_of;
use crate::error::{StoreError, StoreResult};
use crate::traits::Backend;

const FRAME_RAW: u8 = 0;
const FRAME_ZSTD: u8 = 1;
const TEMP_MARKER: &str = ".tmp-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Backend storing one file per block under a root directory.
#[derive(Clone, Debug)]
pub struct FsBackend {
    objects_dir: PathBuf,
    compression_level: Option<i32>,
}

impl FsBackend {
    /// Open (lazily) a store rooted at `root`. Directories are created on the
    /// first write.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            objects_dir: root.as_ref().join("objects"),
            compression_level: None,
        }
    }

    /// Compress newly written blocks with zstd at `level`.
    pub fn with_compression(mut self, level: Option<i32>) -> Self {
        self.compression_level = level;
        self
    }

    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    fn object_path(&self, key: &Key) -> PathBuf {
        let hex = key.to_hex();
        self.objects_dir.join(&hex[..2]).join(&hex[2..])
    }

    fn frame(&self, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        match self.compression_level {
            Some(level) => {
                let compressed = zstd::bulk::compress(bytes, level)?;
                let mut framed = Vec::with_capacity(compressed.len() + 1);
                framed.push(FRAME_ZSTD);
                framed.extend_from_slice(&compressed);
                Ok(framed)
            }
            None => {
                let mut framed = Vec::with_capacity(bytes.len() + 1);
                framed.push(FRAME_RAW);
                framed.extend_from_slice(bytes);
                Ok(framed)
            }
        }
    }

    fn unframe(key: &Key, framed: &[u8]) -> StoreResult<Vec<u8>> {
        match framed.split_first() {
            Some((&FRAME_RAW, body)) => Ok(body.to_vec()),
            Some((&FRAME_ZSTD, body)) => Ok(zstd::stream::decode_all(body)?),
            Some((other, _)) => Err(StoreError::Codec(format!(
                "object {key} has unknown frame header {other}"
            ))),
            None => Err(StoreError::Codec(format!("object {key} is empty"))),
        }
    }
}

#[async_trait]
impl Backend for FsBackend {
    async fn read(&self, key: &Key) -> StoreResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.object_path(key)).await {
            Ok(framed) => Self::unframe(key, &framed).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn add(&self, bytes: &[u8]) -> StoreResult<Key> {
        let key = key_of(bytes);
        let path = self.object_path(&key);
        if tokio::fs::try_exists(&path).await? {
            return Ok(key);
        }

        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Config("object path has no parent".into()))?;
        tokio::fs::create_dir_all(dir).await?;

        let temp = dir.join(format!(
            "{}{}-{}",
            TEMP_MARKER,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, self.frame(bytes)?).await?;
        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(key = %key.short_hex(), bytes = bytes.len(), "wrote loose object");
        Ok(key)
    }

    async fn mem(&self, key: &Key) -> StoreResult<bool> {
        Ok(tokio::fs::try_exists(self.object_path(key)).await?)
    }

    async fn list(&self) -> StoreResult<Vec<Key>> {
        let mut keys = Vec::new();
        let mut fanout = match tokio::fs::read_dir(&self.objects_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(dir) = fanout.next_entry().await? {
            let prefix = dir.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !dir.file_type().await?.is_dir() {
                continue;
            }
            let mut objects = tokio::fs::read_dir(dir.path()).await?;
            while let Some(object) = objects.next_entry().await? {
                let rest = object.file_name().to_string_lossy().into_owned();
                if rest.starts_with(TEMP_MARKER) {
                    continue;
                }
                match Key::from_hex(&format!("{prefix}{rest}")) {
                    Ok(key) => keys.push(key),
                    Err(e) => warn!(path = ?object.path(), error = %e, "skipping stray file"),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
