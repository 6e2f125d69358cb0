//! Assignment deduplication caches.
//!
//! Assignment events are logged to the user's analytics storage. Repeated evaluations of the same
//! flag for the same subject would flood that storage with duplicate events, so the client keeps a
//! cache of assignments it has already logged.
//!
//! The dedup unit is a *slot* identified by `(subject, flag, allocation)`. A slot holds the
//! last-seen variation: seeing the same variation again is a duplicate and is not re-logged;
//! seeing a *different* variation overwrites the slot and the event is logged again. The event
//! stream, not the cache, is the audit signal the analytics pipeline depends on, so a variation
//! flip must be visible there.
//!
//! Two memory tiers are available ([`NonExpiringInMemoryAssignmentCache`] and the bounded
//! [`LruInMemoryAssignmentCache`]), plus [`HybridAssignmentCache`] which backs the memory tier
//! with a host-supplied [`PersistentStorage`] so dedup history survives process restarts. Use
//! [`assignment_cache_factory`] to pick the right composition.

mod factory;
mod hybrid;
mod in_memory;
mod persistent;

pub use factory::{
    assignment_cache_factory, storage_key_suffix_from_api_key, AssignmentCacheOptions,
};
pub use hybrid::HybridAssignmentCache;
pub use in_memory::{LruInMemoryAssignmentCache, NonExpiringInMemoryAssignmentCache};
pub use persistent::{PersistentAssignmentStore, PersistentStorage};

pub(crate) use persistent::{format_storage_key, spawn_detached};

use crate::events::AssignmentEvent;

/// Identifies "this subject got this variation from this allocation of this flag".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssignmentCacheKey {
    /// The key of the subject that received the assignment.
    pub subject_key: String,
    /// The key of the feature flag.
    pub flag_key: String,
    /// The key of the allocation the subject matched.
    pub allocation_key: String,
    /// The key of the variation the subject received.
    pub variation_key: String,
}

impl AssignmentCacheKey {
    /// Encodes the dedup slot for this key.
    ///
    /// The variation is intentionally excluded: the slot maps to the last-seen variation, so a
    /// changed variation overwrites the slot instead of occupying a new one.
    pub(crate) fn cache_slot(&self) -> String {
        encode_parts(&[
            self.subject_key.as_str(),
            self.flag_key.as_str(),
            self.allocation_key.as_str(),
        ])
    }
}

impl From<&AssignmentEvent> for AssignmentCacheKey {
    fn from(event: &AssignmentEvent) -> AssignmentCacheKey {
        AssignmentCacheKey {
            subject_key: event.subject.clone(),
            flag_key: event.feature_flag.clone(),
            allocation_key: event.allocation.clone(),
            variation_key: event.variation.clone(),
        }
    }
}

/// Length-prefixes every part, so keys built from different part boundaries can never collide
/// (e.g., `["ab", "c"]` vs. `["a", "bc"]`). Any input is valid; this never fails.
fn encode_parts(parts: &[&str]) -> String {
    let mut result = String::with_capacity(parts.iter().map(|part| part.len() + 4).sum());
    for part in parts {
        result.push_str(&part.len().to_string());
        result.push(':');
        result.push_str(part);
    }
    result
}

/// A cache of previously logged assignments.
///
/// Implementations are safe to share between threads. `has` and `set` are synchronous and never
/// block on I/O; `init` is the only operation worth awaiting before relying on cross-restart
/// deduplication.
#[async_trait::async_trait]
pub trait AssignmentCache: Send + Sync {
    /// Loads any persisted dedup history into memory. Idempotent; a no-op for purely in-memory
    /// caches.
    async fn init(&self) {}

    /// Returns whether this exact assignment has been seen before: same slot *and* same
    /// variation. A different variation for a previously seen slot returns `false`.
    fn has(&self, key: &AssignmentCacheKey) -> bool;

    /// Records `key` as seen, overwriting whatever variation its slot held before.
    fn set(&self, key: &AssignmentCacheKey);

    /// Drops all cached entries, including any persisted ones.
    async fn clear(&self) {}
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::{PersistentStorage, Result};

    use super::AssignmentCacheKey;

    pub(crate) fn key(
        subject: &str,
        flag: &str,
        allocation: &str,
        variation: &str,
    ) -> AssignmentCacheKey {
        AssignmentCacheKey {
            subject_key: subject.to_owned(),
            flag_key: flag.to_owned(),
            allocation_key: allocation.to_owned(),
            variation_key: variation.to_owned(),
        }
    }

    /// In-memory stand-in for host storage (e.g., AsyncStorage on mobile).
    #[derive(Default)]
    pub(crate) struct FakeStorage {
        pub(crate) store: Mutex<HashMap<String, String>>,
        pub(crate) fail: Mutex<bool>,
    }

    #[async_trait::async_trait]
    impl PersistentStorage for FakeStorage {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            if *self.fail.lock().unwrap() {
                return Err(crate::Error::storage(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "storage unavailable",
                )));
            }
            Ok(self.store.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(crate::Error::storage(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "storage unavailable",
                )));
            }
            self.store
                .lock()
                .unwrap()
                .insert(key.to_owned(), value.to_owned());
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.store.lock().unwrap().remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_slot_excludes_variation() {
        let control = test_helpers::key("subject-1", "flag-1", "allocation-1", "control");
        let treatment = test_helpers::key("subject-1", "flag-1", "allocation-1", "treatment");
        assert_eq!(control.cache_slot(), treatment.cache_slot());
    }

    #[test]
    fn encoding_is_injective_across_part_boundaries() {
        // Naive concatenation would make these collide.
        assert_ne!(
            encode_parts(&["ab", "c", "x"]),
            encode_parts(&["a", "bc", "x"])
        );
        assert_ne!(encode_parts(&["", "ab"]), encode_parts(&["ab", ""]));
    }

    #[test]
    fn encoding_handles_delimiter_lookalikes() {
        // Inputs containing the delimiter or digits must not confuse decoding boundaries.
        assert_ne!(
            encode_parts(&["a:1", "b", "c"]),
            encode_parts(&["a", "1b", "c"])
        );
        assert_ne!(encode_parts(&["1:a", "b"]), encode_parts(&["1", "ab"]));
    }

    #[test]
    fn distinct_slots_encode_differently() {
        let a = test_helpers::key("subject-1", "flag-1", "allocation-1", "control");
        let b = test_helpers::key("subject-1", "flag-1", "allocation-2", "control");
        let c = test_helpers::key("subject-2", "flag-1", "allocation-1", "control");
        assert_ne!(a.cache_slot(), b.cache_slot());
        assert_ne!(a.cache_slot(), c.cache_slot());
    }
}
