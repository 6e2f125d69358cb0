use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use super::{AssignmentCache, AssignmentCacheKey};

/// In-memory assignment cache that never evicts entries.
///
/// This is the memory tier of [`super::HybridAssignmentCache`] and the default for memory-only
/// setups. Entries live for the lifetime of the process.
#[derive(Default)]
pub struct NonExpiringInMemoryAssignmentCache {
    entries: RwLock<HashMap<String, String>>,
}

impl NonExpiringInMemoryAssignmentCache {
    /// Create a new empty cache.
    pub fn new() -> NonExpiringInMemoryAssignmentCache {
        NonExpiringInMemoryAssignmentCache::default()
    }

    /// Snapshot of the raw slot→variation entries, for persistence.
    pub(crate) fn entries_snapshot(&self) -> HashMap<String, String> {
        // Lock can only be poisoned if a writer panicked, which should never happen. Degrade to
        // an empty snapshot instead of propagating the panic.
        match self.entries.read() {
            Ok(entries) => entries.clone(),
            Err(_) => HashMap::new(),
        }
    }

    /// Inserts raw slot→variation entries, bypassing the key codec. Used by hydration, where
    /// entries are already encoded.
    ///
    /// Slots already present are kept: anything written in this process is fresher than the
    /// persisted history being loaded.
    pub(crate) fn insert_raw_entries(&self, entries: impl IntoIterator<Item = (String, String)>) {
        if let Ok(mut slot_map) = self.entries.write() {
            for (slot, variation) in entries {
                if !slot.is_empty() && !variation.is_empty() {
                    slot_map.entry(slot).or_insert(variation);
                }
            }
        }
    }

    pub(crate) fn clear_entries(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }
}

#[async_trait::async_trait]
impl AssignmentCache for NonExpiringInMemoryAssignmentCache {
    fn has(&self, key: &AssignmentCacheKey) -> bool {
        let Ok(entries) = self.entries.read() else {
            return false;
        };
        entries.get(&key.cache_slot()) == Some(&key.variation_key)
    }

    fn set(&self, key: &AssignmentCacheKey) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.cache_slot(), key.variation_key.clone());
        }
    }

    async fn clear(&self) {
        self.clear_entries();
    }
}

/// In-memory assignment cache bounded to `capacity` slots, evicting the least-recently-used slot
/// when full.
///
/// Suitable for long-lived processes evaluating flags for many subjects, where an unbounded dedup
/// map would grow without limit. Eviction can cause a previously seen assignment to be logged
/// again, which is acceptable: analytics pipelines dedup on their side too.
pub struct LruInMemoryAssignmentCache {
    inner: Mutex<LruEntries>,
}

struct LruEntries {
    capacity: usize,
    entries: HashMap<String, String>,
    // Slots ordered from least to most recently used. Linear scans are fine at the capacities
    // this cache is used with.
    order: VecDeque<String>,
}

impl LruEntries {
    fn touch(&mut self, slot: &str) {
        if let Some(position) = self.order.iter().position(|s| s == slot) {
            self.order.remove(position);
        }
        self.order.push_back(slot.to_owned());
    }
}

impl LruInMemoryAssignmentCache {
    /// Create a cache bounded to `capacity` slots. A zero capacity stores nothing.
    pub fn new(capacity: usize) -> LruInMemoryAssignmentCache {
        LruInMemoryAssignmentCache {
            inner: Mutex::new(LruEntries {
                capacity,
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl AssignmentCache for LruInMemoryAssignmentCache {
    fn has(&self, key: &AssignmentCacheKey) -> bool {
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };
        let slot = key.cache_slot();
        let hit = inner.entries.get(&slot) == Some(&key.variation_key);
        if hit {
            inner.touch(&slot);
        }
        hit
    }

    fn set(&self, key: &AssignmentCacheKey) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if inner.capacity == 0 {
            return;
        }
        let slot = key.cache_slot();
        if inner.entries.insert(slot.clone(), key.variation_key.clone()).is_none()
            && inner.entries.len() > inner.capacity
        {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
            }
        }
        inner.touch(&slot);
    }

    async fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.order.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_helpers::key;
    use super::*;

    #[test]
    fn fresh_cache_has_nothing() {
        let cache = NonExpiringInMemoryAssignmentCache::new();
        assert!(!cache.has(&key("subject-1", "flag-1", "allocation-1", "control")));
    }

    #[test]
    fn set_then_has() {
        let cache = NonExpiringInMemoryAssignmentCache::new();
        let k = key("subject-1", "flag-1", "allocation-1", "control");
        cache.set(&k);
        assert!(cache.has(&k));
    }

    #[test]
    fn different_variation_is_a_miss() {
        let cache = NonExpiringInMemoryAssignmentCache::new();
        cache.set(&key("subject-1", "flag-1", "allocation-1", "control"));
        assert!(!cache.has(&key("subject-1", "flag-1", "allocation-1", "treatment")));
    }

    #[test]
    fn variation_change_overwrites_slot() {
        let cache = NonExpiringInMemoryAssignmentCache::new();
        let control = key("subject-1", "flag-1", "allocation-1", "control");
        let treatment = key("subject-1", "flag-1", "allocation-1", "treatment");

        cache.set(&control);
        assert!(cache.has(&control));

        cache.set(&treatment);
        assert!(!cache.has(&control));
        assert!(cache.has(&treatment));

        // The slot is overwritten, not accumulated.
        assert_eq!(cache.entries_snapshot().len(), 1);
    }

    #[test]
    fn set_is_idempotent() {
        let cache = NonExpiringInMemoryAssignmentCache::new();
        let k = key("subject-1", "flag-1", "allocation-1", "control");
        cache.set(&k);
        let snapshot = cache.entries_snapshot();
        cache.set(&k);
        assert!(cache.has(&k));
        assert_eq!(cache.entries_snapshot(), snapshot);
    }

    #[test]
    fn raw_entries_skip_blank_pairs() {
        let cache = NonExpiringInMemoryAssignmentCache::new();
        cache.insert_raw_entries([
            (String::new(), "control".to_owned()),
            ("slot".to_owned(), String::new()),
        ]);
        assert!(cache.entries_snapshot().is_empty());
    }

    #[test]
    fn lru_evicts_least_recently_used_slot() {
        let cache = LruInMemoryAssignmentCache::new(2);
        let first = key("subject-1", "flag-1", "allocation-1", "control");
        let second = key("subject-2", "flag-1", "allocation-1", "control");
        let third = key("subject-3", "flag-1", "allocation-1", "control");

        cache.set(&first);
        cache.set(&second);
        // Touch `first` so `second` becomes the eviction candidate.
        assert!(cache.has(&first));

        cache.set(&third);
        assert!(cache.has(&first));
        assert!(!cache.has(&second));
        assert!(cache.has(&third));
    }

    #[test]
    fn lru_overwrite_does_not_evict() {
        let cache = LruInMemoryAssignmentCache::new(2);
        let control = key("subject-1", "flag-1", "allocation-1", "control");
        let treatment = key("subject-1", "flag-1", "allocation-1", "treatment");
        let other = key("subject-2", "flag-1", "allocation-1", "control");

        cache.set(&control);
        cache.set(&other);
        // Same slot, new variation: replaces in place.
        cache.set(&treatment);

        assert!(cache.has(&treatment));
        assert!(!cache.has(&control));
        assert!(cache.has(&other));
    }

    #[test]
    fn zero_capacity_lru_stores_nothing() {
        let cache = LruInMemoryAssignmentCache::new(0);
        let k = key("subject-1", "flag-1", "allocation-1", "control");
        cache.set(&k);
        assert!(!cache.has(&k));
    }
}
