use std::sync::Arc;

use super::hybrid::HybridAssignmentCache;
use super::in_memory::{LruInMemoryAssignmentCache, NonExpiringInMemoryAssignmentCache};
use super::persistent::PersistentStorage;
use super::AssignmentCache;

/// Options for [`assignment_cache_factory`].
#[derive(Debug, Clone, Default)]
pub struct AssignmentCacheOptions {
    /// Use a memory-only cache even when persistent storage is available.
    pub force_memory_only: bool,
    /// Namespaces the persistent storage key, so multiple SDK instances in the same runtime don't
    /// share or corrupt each other's durable storage. Usually derived from the API key via
    /// [`storage_key_suffix_from_api_key`].
    pub storage_key_suffix: String,
    /// Bound for the memory-only cache. `None` means entries are never evicted. Ignored for the
    /// hybrid cache: hydration must not evict persisted history.
    pub max_entries: Option<usize>,
}

/// Selects the assignment cache composition.
///
/// Returns a memory-only cache when `force_memory_only` is set or the host supplied no
/// [`PersistentStorage`] capability; otherwise a [`HybridAssignmentCache`] namespaced by
/// `storage_key_suffix`. No I/O happens here—it is deferred to the returned cache's
/// [`AssignmentCache::init`].
pub fn assignment_cache_factory(
    options: AssignmentCacheOptions,
    storage: Option<Arc<dyn PersistentStorage>>,
) -> Arc<dyn AssignmentCache> {
    if options.force_memory_only {
        return memory_only_cache(options.max_entries);
    }
    match storage {
        Some(storage) => Arc::new(HybridAssignmentCache::new(
            storage,
            &options.storage_key_suffix,
        )),
        None => memory_only_cache(options.max_entries),
    }
}

fn memory_only_cache(max_entries: Option<usize>) -> Arc<dyn AssignmentCache> {
    match max_entries {
        Some(capacity) => Arc::new(LruInMemoryAssignmentCache::new(capacity)),
        None => Arc::new(NonExpiringInMemoryAssignmentCache::new()),
    }
}

/// Derives a storage-key suffix from an API key: the first 8 alphanumeric characters.
///
/// Enough to tell SDK instances apart without writing the whole credential into storage keys.
pub fn storage_key_suffix_from_api_key(api_key: &str) -> String {
    api_key
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(8)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::{key, FakeStorage};
    use super::*;

    #[test]
    fn suffix_keeps_first_eight_alphanumerics() {
        assert_eq!(storage_key_suffix_from_api_key("abc-123.def456"), "abc123de");
        assert_eq!(storage_key_suffix_from_api_key("a.b"), "ab");
        assert_eq!(storage_key_suffix_from_api_key(""), "");
    }

    #[tokio::test]
    async fn force_memory_only_skips_storage() {
        let storage = Arc::new(FakeStorage::default());
        let cache = assignment_cache_factory(
            AssignmentCacheOptions {
                force_memory_only: true,
                storage_key_suffix: "test".to_owned(),
                max_entries: None,
            },
            Some(storage.clone()),
        );
        cache.init().await;
        cache.set(&key("subject-1", "flag-1", "allocation-1", "control"));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(storage.store.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_storage_capability_means_memory_only() {
        let cache = assignment_cache_factory(AssignmentCacheOptions::default(), None);
        let k = key("subject-1", "flag-1", "allocation-1", "control");
        cache.init().await;
        cache.set(&k);
        assert!(cache.has(&k));
    }

    #[tokio::test]
    async fn storage_capability_means_hybrid() {
        let storage = Arc::new(FakeStorage::default());
        let cache = assignment_cache_factory(
            AssignmentCacheOptions {
                force_memory_only: false,
                storage_key_suffix: "test".to_owned(),
                max_entries: None,
            },
            Some(storage.clone()),
        );
        cache.init().await;
        cache.set(&key("subject-1", "flag-1", "allocation-1", "control"));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(storage
            .store
            .lock()
            .unwrap()
            .contains_key("eppo-assignment-test"));
    }
}
