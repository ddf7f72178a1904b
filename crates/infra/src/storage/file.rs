use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{PersistentStore, StoreError};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::errors::from_io;

const RECORD_EXTENSION: &str = "bin";

/// Directory-backed store with one file per key.
///
/// File names are the SHA-256 hex of the key, so arbitrary keys map to
/// portable names. Writes go to a temporary sibling first and are renamed
/// into place, so a crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    staging_seq: Arc<AtomicU64>,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "file store opened");
        Ok(Self { root, staging_seq: Arc::new(AtomicU64::new(0)) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root.join(format!("{}.{RECORD_EXTENSION}", hex::encode(digest)))
    }
}

#[async_trait]
impl PersistentStore for FileStore {
    #[instrument(skip(self), level = "trace")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(None),
            Err(err) => Err(from_io(key, err)),
        }
    }

    #[instrument(skip(self, value), level = "trace", fields(bytes = value.len()))]
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key);
        let seq = self.staging_seq.fetch_add(1, Ordering::Relaxed);
        let staging = path.with_extension(format!("{seq}.tmp"));
        tokio::fs::write(&staging, value).await.map_err(|err| from_io(key, err))?;
        tokio::fs::rename(&staging, &path).await.map_err(|err| from_io(key, err))
    }

    #[instrument(skip(self), level = "trace")]
    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(()),
            Err(err) => Err(from_io(key, err)),
        }
    }
}
