//! Two-tier TTL cache
//!
//! A fast in-process tier (`DashMap`) in front of a durable on-disk tier (one
//! JSON record per key). Expiry is checked lazily on read. Storage faults never
//! reach the caller: a failed read is a miss and a failed write is a no-op.

pub mod clock;
mod disk;
pub mod entry;
pub mod error;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, RECORD_FORMAT};
pub use error::{CacheError, CacheResult};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use disk::DiskTier;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where and under which namespace the durable tier lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub dir: PathBuf,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            namespace: default_namespace(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub disk_bytes: u64,
    pub directory: Option<PathBuf>,
}

struct Inner {
    memory: DashMap<String, CacheEntry>,
    disk: Option<DiskTier>,
    clock: Arc<dyn Clock>,
    /// Bumped by `invalidate`; a durable read taken under an older generation is not promoted
    generations: DashMap<String, u64>,
}

/// Cloning is cheap; clones share both tiers.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("memory_entries", &self.inner.memory.len())
            .field("disk", &self.inner.disk.as_ref().map(|d| d.root().to_path_buf()))
            .finish()
    }
}

impl CacheManager {
    /// Open a cache with a durable tier. If the directory cannot be created the
    /// cache runs memory-only.
    pub async fn open(config: &CacheConfig) -> Self {
        Self::open_with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn open_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let disk = match DiskTier::open(&config.dir, &config.namespace).await {
            Ok(disk) => {
                tracing::info!("Durable cache tier at {}", disk.root().display());
                Some(disk)
            }
            Err(e) => {
                tracing::warn!("Durable cache tier unavailable, running memory-only: {}", e);
                None
            }
        };
        Self::from_parts(disk, clock)
    }

    /// Fast tier only
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::from_parts(None, clock)
    }

    fn from_parts(disk: Option<DiskTier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                memory: DashMap::new(),
                disk,
                clock,
                generations: DashMap::new(),
            }),
        }
    }

    /// Current time on the cache's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn has_durable_tier(&self) -> bool {
        self.inner.disk.is_some()
    }

    /// On-disk location of the record for `key`, if there is a durable tier
    pub fn entry_path(&self, key: &str) -> Option<PathBuf> {
        self.inner.disk.as_ref().map(|d| d.path_for(key))
    }

    /// Fresh value for `key`, or `None` on miss, expiry, or a value that does not
    /// deserialize as `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.get_entry(key).await?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Cached value for {} has an unexpected shape: {}", key, e);
                None
            }
        }
    }

    /// Fresh raw entry for `key`. Fast tier first, then the durable tier with
    /// promotion. Stale entries are purged from the tier they were found in.
    pub async fn get_entry(&self, key: &str) -> Option<CacheEntry> {
        let now = self.inner.clock.now();

        let cached = self.inner.memory.get(key).map(|e| e.value().clone());
        if let Some(entry) = cached {
            if entry.is_fresh(now) {
                return Some(entry);
            }
            self.inner.memory.remove_if(key, |_, e| !e.is_fresh(now));
        }

        let disk = self.inner.disk.as_ref()?;
        let generation = self.generation(key);
        match disk.read(key).await {
            Ok(Some(entry)) if entry.is_fresh(now) => {
                if self.promote(key, generation, &entry) {
                    Some(entry)
                } else {
                    tracing::debug!("Cache record for {} was invalidated during read", key);
                    None
                }
            }
            Ok(Some(_)) => {
                if let Err(e) = disk.remove_if_stale(key, now).await {
                    tracing::debug!("Failed to purge stale cache record for {}: {}", key, e);
                }
                None
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Durable cache read for {} degraded to miss: {}", key, e);
                None
            }
        }
    }

    fn generation(&self, key: &str) -> u64 {
        self.inner.generations.get(key).map_or(0, |g| *g)
    }

    /// Copy a durable record into the fast tier unless `key` was invalidated
    /// since `generation` was taken. Keeps the original created_at/ttl and never
    /// clobbers a newer write.
    fn promote(&self, key: &str, generation: u64, entry: &CacheEntry) -> bool {
        // Held until the insert so `invalidate` cannot slip in between
        let current = self.inner.generations.get(key);
        if current.as_deref().copied().unwrap_or(0) != generation {
            return false;
        }
        self.inner
            .memory
            .entry(key.to_string())
            .and_modify(|existing| {
                if existing.created_at < entry.created_at {
                    *existing = entry.clone();
                }
            })
            .or_insert_with(|| entry.clone());
        drop(current);
        true
    }

    /// Store `value` under `key` in both tiers. Returns `false` if any tier could
    /// not be written; the caller is never failed by this.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> bool {
        let value = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Could not serialize cache value for {}: {}", key, e);
                return false;
            }
        };

        let entry = CacheEntry::new(key, value, self.inner.clock.now(), ttl);
        self.inner.memory.insert(key.to_string(), entry.clone());

        match &self.inner.disk {
            Some(disk) => match disk.write(&entry).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("Durable cache write for {} skipped: {}", key, e);
                    false
                }
            },
            None => true,
        }
    }

    /// Remove `key` from both tiers. A `get` that read the durable record before
    /// this returned does not put it back.
    pub async fn invalidate(&self, key: &str) {
        self.inner.memory.remove(key);
        if let Some(disk) = &self.inner.disk {
            if let Err(e) = disk.remove(key).await {
                tracing::warn!("Durable cache invalidate for {} failed: {}", key, e);
            }
        }
        let mut generation = self.inner.generations.entry(key.to_string()).or_insert(0);
        *generation += 1;
        self.inner.memory.remove(key);
    }

    /// Return the cached value or compute, store and return it.
    /// Errors from `fetch` are passed through and nothing is cached.
    pub async fn get_or_insert_with<T, E, F, Fut>(&self, key: &str, ttl: Duration, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value, ttl).await;
        Ok(value)
    }

    /// Sweep both tiers for stale (and, on disk, unreadable) records
    pub async fn purge_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let before = self.inner.memory.len();
        self.inner.memory.retain(|_, e| e.is_fresh(now));
        let mut removed = before.saturating_sub(self.inner.memory.len());

        if let Some(disk) = &self.inner.disk {
            match disk.purge_expired(now).await {
                Ok(n) => removed += n,
                Err(e) => tracing::warn!("Durable cache sweep failed: {}", e),
            }
        }
        tracing::debug!("Purged {} expired cache entries", removed);
        removed
    }

    /// Drop every entry in both tiers
    pub async fn clear(&self) {
        self.inner.memory.clear();
        if let Some(disk) = &self.inner.disk {
            if let Err(e) = disk.clear().await {
                tracing::warn!("Durable cache clear failed: {}", e);
            }
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let (disk_entries, disk_bytes) = match &self.inner.disk {
            Some(disk) => disk.usage().await.unwrap_or_else(|e| {
                tracing::warn!("Could not read durable cache usage: {}", e);
                (0, 0)
            }),
            None => (0, 0),
        };
        CacheStats {
            memory_entries: self.inner.memory.len(),
            disk_entries,
            disk_bytes,
            directory: self.inner.disk.as_ref().map(|d| d.root().to_path_buf()),
        }
    }
}
