//! JSON file-backed cache tier.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::store::{CacheStore, CachedResult};
use crate::geocoder::StorageError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    value: CachedResult,
    /// Seconds since epoch; `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<u64>,
    /// Write order, oldest evicted first.
    #[serde(default)]
    seq: u64,
}

impl FileEntry {
    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map_or(true, |deadline| deadline > now)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn read_entries(path: &Path) -> Result<HashMap<String, FileEntry>, StorageError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Clears the queued-flush flag if its owner goes away before flushing.
struct QueuedFlush<'a>(&'a AtomicBool);

impl Drop for QueuedFlush<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Persists every entry to a single JSON file.
///
/// Reads are served from memory. Writes rewrite the whole file through a
/// temporary sibling and a rename, at most one writing and one queued at a
/// time; a `set` that finds a flush already queued leaves its entry to it.
/// Expired entries are pruned and the oldest dropped beyond `capacity`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    capacity: usize,
    entries: DashMap<String, FileEntry>,
    next_seq: AtomicU64,
    flush_queued: AtomicBool,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open `path`, loading any live entries it already holds.
    ///
    /// A file that cannot be read starts the store empty. One that does not
    /// parse is renamed to `*.corrupt` first.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let store = Self {
            capacity: capacity.max(1),
            entries: DashMap::new(),
            next_seq: AtomicU64::new(0),
            flush_queued: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            path,
        };
        if !store.path.exists() {
            return store;
        }

        match read_entries(&store.path) {
            Ok(stored) => {
                let next_seq = stored.values().map(|e| e.seq + 1).max().unwrap_or(0);
                store.next_seq.store(next_seq, Ordering::Relaxed);
                for (key, entry) in stored {
                    store.entries.insert(key, entry);
                }
                store.prune(unix_now());
                tracing::info!(
                    path = %store.path.display(),
                    entries = store.entries.len(),
                    "Loaded cache file"
                );
            }
            Err(StorageError::Serialization(e)) => {
                let aside = store.path.with_extension("corrupt");
                tracing::warn!(
                    path = %store.path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Cache file is corrupt, starting empty"
                );
                if let Err(e) = std::fs::rename(&store.path, &aside) {
                    tracing::warn!(path = %store.path.display(), error = %e, "Failed to move corrupt cache file");
                }
            }
            Err(e) => {
                tracing::warn!(path = %store.path.display(), error = %e, "Cache file unreadable, starting empty");
            }
        }
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries, then the oldest ones beyond capacity.
    fn prune(&self, now: u64) {
        self.entries.retain(|_, entry| entry.is_live(now));

        let len = self.entries.len();
        if len <= self.capacity {
            return;
        }
        let mut seqs: Vec<u64> = self.entries.iter().map(|entry| entry.seq).collect();
        seqs.sort_unstable();
        let cutoff = seqs[len - self.capacity];
        self.entries.retain(|_, entry| entry.seq >= cutoff);
        tracing::debug!(evicted = len - self.entries.len(), "Evicted durable cache entries");
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let queued = QueuedFlush(&self.flush_queued);
        let _guard = self.write_lock.lock().await;
        drop(queued);

        self.prune(unix_now());
        let snapshot: HashMap<String, FileEntry> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let bytes = serde_json::to_vec(&snapshot)?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        tracing::debug!(path = %self.path.display(), entries = snapshot.len(), "Saved cache file");
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<CachedResult>, StorageError>> {
        async move {
            let now = unix_now();
            let live = self
                .entries
                .get(key)
                .map(|entry| (entry.is_live(now), entry.value.clone()));
            match live {
                Some((true, value)) => Ok(Some(value)),
                Some((false, _)) => {
                    self.entries.remove(key);
                    Ok(None)
                }
                None => Ok(None),
            }
        }
        .boxed()
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: CachedResult,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), StorageError>> {
        async move {
            let expires_at = ttl.map(|ttl| unix_now().saturating_add(ttl.as_secs().max(1)));
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            self.entries.insert(
                key.to_string(),
                FileEntry {
                    value,
                    expires_at,
                    seq,
                },
            );

            // A queued flush has not snapshotted yet and will pick this entry up.
            if self.flush_queued.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            self.flush().await
        }
        .boxed()
    }
}
