use crate::gateway::AnalysisBackend;
use crate::store::{PersistentStore, StoreResult, keys};
use crate::types::{CachedDataset, DatasetFile};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;

/// Datasets at or above this size are not cached.
pub const MAX_CACHED_BYTES: usize = 5 * 1024 * 1024;
pub const RESTORED_FILENAME: &str = "restored_data.csv";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOutcome {
    Cached,
    TooLarge { size_bytes: usize },
    NotText,
    /// The store rejected the write; already logged.
    Failed,
}

/// Keeps the most recent upload so it can be replayed after a reload.
#[derive(Clone)]
pub struct DatasetCache {
    store: Arc<dyn PersistentStore>,
}

impl DatasetCache {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Overwrite the cached dataset. Oversized or non-text files are skipped
    /// with a warning.
    pub fn cache(&self, file: &DatasetFile) -> CacheOutcome {
        let size_bytes = file.size_bytes();
        if size_bytes >= MAX_CACHED_BYTES {
            tracing::warn!(filename = %file.filename, size_bytes, "file too large to cache");
            return CacheOutcome::TooLarge { size_bytes };
        }

        let Ok(content) = std::str::from_utf8(&file.bytes) else {
            tracing::warn!(filename = %file.filename, "file is not text, not caching");
            return CacheOutcome::NotText;
        };

        match self.write(content, &file.filename) {
            Ok(()) => CacheOutcome::Cached,
            Err(err) => {
                tracing::warn!(error = %err, "failed to cache file");
                CacheOutcome::Failed
            }
        }
    }

    pub fn cached(&self) -> Option<CachedDataset> {
        let content = self.store.get(keys::CACHED_CSV)?;
        let filename = self
            .store
            .get(keys::CACHED_FILENAME)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| RESTORED_FILENAME.to_string());
        Some(CachedDataset {
            filename,
            size_bytes: content.len(),
            content,
        })
    }

    fn write(&self, content: &str, filename: &str) -> StoreResult<()> {
        self.store.set(keys::CACHED_CSV, content)?;
        self.store.set(keys::CACHED_FILENAME, filename)
    }
}

/// Result of asking the restorer to run.
#[derive(Debug)]
pub enum Restoration {
    /// Already ran for this process, or nothing was cached.
    Skipped,
    /// Background re-upload in flight.
    Pending(JoinHandle<()>),
}

impl Restoration {
    pub fn is_pending(&self) -> bool {
        matches!(self, Restoration::Pending(_))
    }

    /// Wait for the background upload, if any.
    pub async fn finished(self) {
        if let Restoration::Pending(handle) = self {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "restore task did not complete");
            }
        }
    }
}

/// Replays the cached dataset to the backend once per process so the server
/// rebuilds its analysis context after a reload.
pub struct SessionRestorer {
    cache: DatasetCache,
    backend: Arc<dyn AnalysisBackend>,
    restored: AtomicBool,
}

impl SessionRestorer {
    pub fn new(cache: DatasetCache, backend: Arc<dyn AnalysisBackend>) -> Self {
        Self {
            cache,
            backend,
            restored: AtomicBool::new(false),
        }
    }

    /// Fire-and-forget. Must be called inside a tokio runtime; upload errors
    /// are logged and never reach the caller.
    pub fn restore(&self) -> Restoration {
        if self.restored.swap(true, Ordering::SeqCst) {
            return Restoration::Skipped;
        }
        let Some(cached) = self.cache.cached() else {
            return Restoration::Skipped;
        };

        let backend = Arc::clone(&self.backend);
        let file = cached.into_file();
        Restoration::Pending(tokio::spawn(async move {
            match backend.upload(&file).await {
                Ok(()) => tracing::info!(filename = %file.filename, "session restored from cache"),
                Err(err) => tracing::warn!(error = %err, "failed to restore session"),
            }
        }))
    }

    pub fn has_run(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }
}
