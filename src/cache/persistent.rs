use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::{Error, Result};

/// Storage key under which the assignment dedup cache is persisted (plus an optional
/// instance-specific suffix).
pub(crate) const ASSIGNMENT_STORAGE_KEY_PREFIX: &str = "eppo-assignment";

/// Async key-value storage capability supplied by the host environment.
///
/// The cache subsystem is storage-agnostic: it only needs string-keyed string blobs. Hosts back
/// this with whatever is durable in their environment (AsyncStorage on React Native, local
/// storage in browsers, a file on disk, ...).
///
/// Implementations should return [`Error::Storage`] (see [`Error::storage`]) for underlying
/// failures; the cache subsystem logs and swallows them, so a broken storage degrades the SDK to
/// memory-only behavior instead of failing evaluation.
#[async_trait::async_trait]
pub trait PersistentStorage: Send + Sync {
    /// Returns the blob stored under `key`, or `None` if nothing has been stored yet.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous blob.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the blob stored under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Adapter between the assignment cache's memory tier and a [`PersistentStorage`].
///
/// The whole cache content round-trips through a single JSON blob (a flat map of slot keys to
/// variation keys) under one storage key. There is no per-entry read path: the memory tier is
/// authoritative for reads, this adapter only hydrates it at startup and mirrors it afterwards.
pub struct PersistentAssignmentStore {
    storage: Arc<dyn PersistentStorage>,
    storage_key: String,
}

impl PersistentAssignmentStore {
    /// Create an adapter persisting under `eppo-assignment` plus the given suffix.
    pub fn new(
        storage: Arc<dyn PersistentStorage>,
        storage_key_suffix: &str,
    ) -> PersistentAssignmentStore {
        PersistentAssignmentStore {
            storage,
            storage_key: format_storage_key(ASSIGNMENT_STORAGE_KEY_PREFIX, storage_key_suffix),
        }
    }

    /// One-shot bulk read of the persisted entries, executed at startup.
    ///
    /// A missing blob, a storage failure, or a malformed blob all hydrate to an empty cache: a
    /// one-time duplicate assignment event is preferable to blocking or failing evaluation.
    pub async fn hydrate(&self) -> Vec<(String, String)> {
        match self.try_hydrate().await {
            Ok(entries) => entries,
            Err(err) => {
                let storage_key = self.storage_key.as_str();
                log::warn!(target: "eppo",
                           storage_key;
                           "failed to hydrate assignment cache, starting empty: {:?}", err);
                Vec::new()
            }
        }
    }

    async fn try_hydrate(&self) -> Result<Vec<(String, String)>> {
        let Some(blob) = self.storage.get(&self.storage_key).await? else {
            return Ok(Vec::new());
        };
        let entries: HashMap<String, String> =
            serde_json::from_str(&blob).map_err(|_| Error::CacheParseError)?;
        Ok(entries.into_iter().collect())
    }

    /// Writes the full current key space in one blob. Failures are logged and dropped; the memory
    /// tier remains authoritative.
    pub async fn persist(&self, snapshot: &HashMap<String, String>) {
        let blob = match serde_json::to_string(snapshot) {
            Ok(blob) => blob,
            Err(err) => {
                log::warn!(target: "eppo", "failed to serialize assignment cache: {:?}", err);
                return;
            }
        };
        if let Err(err) = self.storage.set(&self.storage_key, &blob).await {
            let storage_key = self.storage_key.as_str();
            log::warn!(target: "eppo",
                       storage_key;
                       "failed to persist assignment cache: {:?}", err);
        }
    }

    /// Removes the persisted blob. Failures are logged and dropped.
    pub async fn clear(&self) {
        if let Err(err) = self.storage.remove(&self.storage_key).await {
            let storage_key = self.storage_key.as_str();
            log::warn!(target: "eppo",
                       storage_key;
                       "failed to clear persisted assignment cache: {:?}", err);
        }
    }

    #[cfg(test)]
    pub(crate) fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

pub(crate) fn format_storage_key(prefix: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        prefix.to_owned()
    } else {
        format!("{prefix}-{suffix}")
    }
}

/// Runs `future` as a detached background task: the caller does not wait for it and its outcome
/// is only observable through logs.
///
/// Persistence is best-effort by contract. Outside of a tokio runtime there is nothing to run the
/// task on, so the write is skipped; the memory tier is unaffected.
pub(crate) fn spawn_detached<F>(description: &'static str, future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(future);
        }
        Err(_) => {
            log::warn!(target: "eppo",
                       "no tokio runtime available, skipping {}", description);
        }
    }
}
