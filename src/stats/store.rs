//! Counter store: where usage records persist.
//!
//! # Responsibilities
//! - Define the get/set/update contract the proxy depends on
//! - Provide an in-memory store and a JSON-file-backed store
//! - Open the configured store, falling back to memory on failure
//!
//! # Design Decisions
//! - `update` is the write path; stores override it to make the
//!   read-modify-write atomic so concurrent increments are not lost
//! - Store handles are created once at startup and passed in, never global
//! - The file store applies updates in memory and writes a serialized
//!   snapshot after releasing the record lock. Writes themselves are
//!   serialized and skip snapshots older than the last one written, so a
//!   burst of N updates costs at most N file rewrites but never blocks
//!   readers or other updates on disk I/O. Throughput is still bounded by
//!   one whole-file rewrite per write; heavy traffic wants the memory store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{StoreBackend, StoreConfig};
use crate::stats::usage::UsageRecord;

/// Errors that can occur while talking to a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Transformation applied by [`CounterStore::update`].
pub type UpdateFn<'a> = Box<dyn FnOnce(Option<UsageRecord>) -> UsageRecord + Send + 'a>;

/// Key-value contract for usage records.
#[async_trait]
pub trait CounterStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<UsageRecord>, StoreError>;

    async fn set(&self, key: &str, record: UsageRecord) -> Result<(), StoreError>;

    /// Read-modify-write. The default is a plain get-then-set; stores that
    /// can do better override it.
    async fn update(&self, key: &str, apply: UpdateFn<'_>) -> Result<UsageRecord, StoreError> {
        let current = self.get(key).await?;
        let next = apply(current);
        self.set(key, next.clone()).await?;
        Ok(next)
    }
}

/// Process-local store. Updates are atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, UsageRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<UsageRecord>, StoreError> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    async fn set(&self, key: &str, record: UsageRecord) -> Result<(), StoreError> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    async fn update(&self, key: &str, apply: UpdateFn<'_>) -> Result<UsageRecord, StoreError> {
        // The entry guard holds the shard lock for the whole closure.
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let next = apply(Some(entry.get().clone()));
                entry.insert(next.clone());
                Ok(next)
            }
            Entry::Vacant(entry) => {
                let next = apply(None);
                entry.insert(next.clone());
                Ok(next)
            }
        }
    }
}

/// JSON file holding every key. Writes go to a sibling temp file that is
/// renamed over the original, so a crash never leaves a half-written file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    records: Mutex<Records>,
    /// Generation of the last snapshot on disk. Held while writing.
    written: Mutex<u64>,
}

#[derive(Debug)]
struct Records {
    map: HashMap<String, UsageRecord>,
    generation: u64,
}

/// A serialized view of the records taken under the record lock.
struct Snapshot {
    generation: u64,
    bytes: Vec<u8>,
}

impl FileStore {
    /// Open the store, loading the file if it exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let map: HashMap<String, UsageRecord> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        let keys = map.len();

        let store = Self {
            path,
            records: Mutex::new(Records { map, generation: 1 }),
            written: Mutex::new(0),
        };

        // Fail at startup rather than on the first request if the location is unwritable.
        let snapshot = store.records.lock().await.snapshot()?;
        store.persist(snapshot).await?;
        tracing::info!(path = ?store.path, keys, "Loaded usage store");
        Ok(store)
    }

    /// Write `snapshot` unless a newer one is already on disk.
    async fn persist(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut written = self.written.lock().await;
        if snapshot.generation <= *written {
            return Ok(());
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, snapshot.bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        *written = snapshot.generation;
        Ok(())
    }
}

impl Records {
    fn insert(&mut self, key: &str, record: UsageRecord) -> Result<Snapshot, StoreError> {
        self.map.insert(key.to_string(), record);
        self.generation += 1;
        self.snapshot()
    }

    fn snapshot(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            generation: self.generation,
            bytes: serde_json::to_vec(&self.map)?,
        })
    }
}

#[async_trait]
impl CounterStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<UsageRecord>, StoreError> {
        Ok(self.records.lock().await.map.get(key).cloned())
    }

    async fn set(&self, key: &str, record: UsageRecord) -> Result<(), StoreError> {
        let snapshot = self.records.lock().await.insert(key, record)?;
        self.persist(snapshot).await
    }

    async fn update(&self, key: &str, apply: UpdateFn<'_>) -> Result<UsageRecord, StoreError> {
        let (next, snapshot) = {
            let mut records = self.records.lock().await;
            let next = apply(records.map.get(key).cloned());
            let snapshot = records.insert(key, next.clone())?;
            (next, snapshot)
        };
        self.persist(snapshot).await?;
        Ok(next)
    }
}

/// Open the configured store. A file store that cannot be opened degrades
/// to an in-memory store so the proxy keeps serving.
pub async fn open_store(config: &StoreConfig) -> Arc<dyn CounterStore> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory usage store");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::File => match FileStore::open(&config.path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::error!(path = %config.path, error = %e, "Failed to open usage store, falling back to memory");
                Arc::new(MemoryStore::new())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bump(endpoint: &'static str) -> UpdateFn<'static> {
        Box::new(move |current| {
            let mut record = current.unwrap_or_default();
            record.record(endpoint, 1_000);
            record
        })
    }

    #[tokio::test]
    async fn test_memory_get_set() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());

        let mut record = UsageRecord::default();
        record.total = 7;
        store.set("k", record.clone()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn test_memory_concurrent_updates_are_not_lost() {
        let store = Arc::new(MemoryStore::new());
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.update("k", bump("/openai")).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let record = store.get("k").await.unwrap().unwrap();
        assert_eq!(record.total, 50);
        assert_eq!(record.endpoints["/openai"].total, 50);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let store = FileStore::open(&path).await.unwrap();
        store.update("api_stats", bump("/claude")).await.unwrap();
        store.update("api_stats", bump("/claude")).await.unwrap();
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        let record = reopened.get("api_stats").await.unwrap().unwrap();
        assert_eq!(record.total, 2);
        assert_eq!(record.endpoints["/claude"].total, 2);
    }

    #[tokio::test]
    async fn test_file_store_concurrent_updates_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let store = Arc::new(FileStore::open(&path).await.unwrap());
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store.update("api_stats", bump("/openai")).await.unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(store.get("api_stats").await.unwrap().unwrap().total, 20);
        drop(store);

        let reopened = FileStore::open(&path).await.unwrap();
        let record = reopened.get("api_stats").await.unwrap().unwrap();
        assert_eq!(record.total, 20);
        assert_eq!(record.endpoints["/openai"].total, 20);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(matches!(FileStore::open(&path).await, Err(StoreError::Serde(_))));
    }

    #[tokio::test]
    async fn test_open_store_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::File,
            path: dir.path().join("missing-dir").join("stats.json").display().to_string(),
        };

        let store = open_store(&config).await;
        store.update("k", bump("/xai")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap().total, 1);
    }
}
