use std::sync::Arc;

use tokio::sync::OnceCell;

use super::in_memory::NonExpiringInMemoryAssignmentCache;
use super::persistent::{spawn_detached, PersistentAssignmentStore, PersistentStorage};
use super::{AssignmentCache, AssignmentCacheKey};

/// Two-tier assignment cache: a synchronous memory tier serves every read, a persistent tier
/// keeps dedup history across process restarts.
///
/// `init()` hydrates the memory tier from storage exactly once. `has`/`set` work before `init()`
/// resolves too—they just see only what was written in this process, so an assignment logged
/// before a restart may be logged once more. That is a documented trade: evaluation is never
/// blocked on storage I/O.
///
/// Every mutation schedules a fire-and-forget write of the *full* current snapshot, so overlapping
/// writes cannot lose each other's entries: whichever write completes last still carries the
/// latest memory-tier state. One instance must exclusively own its storage namespace; two live
/// instances with the same storage key suffix race on the same blob.
pub struct HybridAssignmentCache {
    memory: Arc<NonExpiringInMemoryAssignmentCache>,
    persistent: Arc<PersistentAssignmentStore>,
    hydrated: OnceCell<()>,
}

impl HybridAssignmentCache {
    /// Create a hybrid cache persisting under `eppo-assignment` plus the given suffix.
    pub fn new(
        storage: Arc<dyn PersistentStorage>,
        storage_key_suffix: &str,
    ) -> HybridAssignmentCache {
        HybridAssignmentCache {
            memory: Arc::new(NonExpiringInMemoryAssignmentCache::new()),
            persistent: Arc::new(PersistentAssignmentStore::new(storage, storage_key_suffix)),
            hydrated: OnceCell::new(),
        }
    }

    // The snapshot is taken when the task runs, not when it is scheduled, so even if overlapping
    // persists complete out of order, the last one to complete carries the memory tier's latest
    // state.
    fn schedule_persist(&self) {
        let memory = Arc::clone(&self.memory);
        let persistent = Arc::clone(&self.persistent);
        spawn_detached("assignment cache persistence", async move {
            persistent.persist(&memory.entries_snapshot()).await;
        });
    }
}

#[async_trait::async_trait]
impl AssignmentCache for HybridAssignmentCache {
    /// Hydrates the memory tier from persistent storage. Idempotent: concurrent and repeated
    /// calls await the same one-shot bulk read.
    async fn init(&self) {
        self.hydrated
            .get_or_init(|| async {
                let entries = self.persistent.hydrate().await;
                let count = entries.len();
                self.memory.insert_raw_entries(entries);
                log::debug!(target: "eppo",
                            count;
                            "hydrated assignment cache from persistent storage");
            })
            .await;
    }

    fn has(&self, key: &AssignmentCacheKey) -> bool {
        self.memory.has(key)
    }

    fn set(&self, key: &AssignmentCacheKey) {
        self.memory.set(key);
        self.schedule_persist();
    }

    async fn clear(&self) {
        self.memory.clear_entries();
        self.persistent.clear().await;
    }
}
