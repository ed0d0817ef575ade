use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use crate::entry::{CacheEntry, RECORD_FORMAT};
use crate::error::{CacheError, CacheResult};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// File-per-key store under `<dir>/<namespace>/`.
///
/// Writes go to a uniquely named temp file in the same directory and are then
/// renamed over the target, so a reader sees either the previous record or the
/// new one.
#[derive(Debug)]
pub(crate) struct DiskTier {
    root: PathBuf,
}

fn sanitize_namespace(namespace: &str) -> String {
    let cleaned: String = namespace
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(ext)
}

impl DiskTier {
    pub(crate) async fn open(dir: &Path, namespace: &str) -> CacheResult<Self> {
        let root = dir.join(sanitize_namespace(namespace));
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(&root, e))?;
        Ok(Self { root })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", key_digest(key), RECORD_EXTENSION))
    }

    async fn read_path(path: &Path) -> CacheResult<Option<CacheEntry>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };

        let entry: CacheEntry = serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if entry.format != RECORD_FORMAT {
            return Err(CacheError::ForeignRecord {
                path: path.to_path_buf(),
            });
        }
        Ok(Some(entry))
    }

    /// Read the record for `key`. A record written for a different key is foreign.
    pub(crate) async fn read(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let path = self.path_for(key);
        match Self::read_path(&path).await? {
            Some(entry) if entry.key != key => Err(CacheError::ForeignRecord { path }),
            other => Ok(other),
        }
    }

    pub(crate) async fn write(&self, entry: &CacheEntry) -> CacheResult<()> {
        let bytes = serde_json::to_vec(entry)?;
        let target = self.path_for(&entry.key);
        let temp = self.root.join(format!(
            ".{}.{}.{}",
            key_digest(&entry.key),
            Uuid::new_v4().simple(),
            TEMP_EXTENSION
        ));

        if let Err(e) = fs::write(&temp, &bytes).await {
            fs::remove_file(&temp).await.ok();
            return Err(CacheError::io(&temp, e));
        }
        if let Err(e) = fs::rename(&temp, &target).await {
            fs::remove_file(&temp).await.ok();
            return Err(CacheError::io(&target, e));
        }
        Ok(())
    }

    /// Returns whether a record existed
    pub(crate) async fn remove(&self, key: &str) -> CacheResult<bool> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Remove the record for `key` only if it is still stale at `now`.
    /// Narrows the window in which a concurrent fresh write could be dropped.
    pub(crate) async fn remove_if_stale(&self, key: &str, now: DateTime<Utc>) -> CacheResult<bool> {
        match self.read(key).await? {
            Some(entry) if !entry.is_fresh(now) => self.remove(key).await,
            _ => Ok(false),
        }
    }

    async fn record_paths(&self) -> CacheResult<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| CacheError::io(&self.root, e))?;
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(&self.root, e))?
        {
            let path = item.path();
            if has_extension(&path, RECORD_EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Delete stale and unreadable records; returns how many were removed
    pub(crate) async fn purge_expired(&self, now: DateTime<Utc>) -> CacheResult<usize> {
        let mut removed = 0;
        for path in self.record_paths().await? {
            let stale = match Self::read_path(&path).await {
                Ok(Some(entry)) => !entry.is_fresh(now),
                Ok(None) => false,
                Err(CacheError::Io { .. }) => false,
                Err(_) => true,
            };
            if stale && fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub(crate) async fn clear(&self) -> CacheResult<usize> {
        let mut removed = 0;
        for path in self.record_paths().await? {
            if fs::remove_file(&path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// (record count, total bytes)
    pub(crate) async fn usage(&self) -> CacheResult<(usize, u64)> {
        let mut count = 0;
        let mut bytes = 0;
        for path in self.record_paths().await? {
            if let Ok(meta) = fs::metadata(&path).await {
                count += 1;
                bytes += meta.len();
            }
        }
        Ok((count, bytes))
    }
}
