use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;

use crate::cache::PersistentStorage;
use crate::{Configuration, Error, Result};

/// Storage key under which configuration is persisted. Versioned: bump on breaking changes to the
/// persisted format, so an old blob hydrates as empty instead of misparsing.
pub(crate) const CONFIGURATION_STORAGE_KEY_PREFIX: &str = "eppo-configuration-v1";

/// Read/write access to the currently active [`Configuration`].
///
/// Readers always get a consistent snapshot: holding onto the returned `Arc` keeps serving the
/// same configuration even if a writer replaces it mid-operation.
#[async_trait::async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Loads any persisted configuration into memory. Idempotent; a no-op for purely in-memory
    /// stores.
    async fn init(&self) {}

    /// Get currently-active configuration. Returns `None` if configuration hasn't been stored
    /// yet.
    fn get_configuration(&self) -> Option<Arc<Configuration>>;

    /// Set new configuration, replacing the previous one completely.
    fn set_configuration(&self, configuration: Configuration);
}

/// `InMemoryConfigurationStore` provides a thread-safe in-memory storage for configuration that
/// allows concurrent access for readers and writers.
#[derive(Default)]
pub struct InMemoryConfigurationStore {
    configuration: RwLock<Option<Arc<Configuration>>>,
}

impl InMemoryConfigurationStore {
    /// Create a new empty configuration store.
    pub fn new() -> InMemoryConfigurationStore {
        InMemoryConfigurationStore::default()
    }

    fn set_arc(&self, configuration: Arc<Configuration>) {
        // Lock can only be poisoned if a writer panicked, which should never happen. A failed
        // write here means readers keep the previous configuration.
        if let Ok(mut slot) = self.configuration.write() {
            *slot = Some(configuration);
        }
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for InMemoryConfigurationStore {
    fn get_configuration(&self) -> Option<Arc<Configuration>> {
        let configuration = self.configuration.read().ok()?;
        configuration.clone()
    }

    fn set_configuration(&self, configuration: Configuration) {
        self.set_arc(Arc::new(configuration));
    }
}

/// Configuration store with the same two-tier design as
/// [`HybridAssignmentCache`](crate::cache::HybridAssignmentCache): memory serves every read,
/// writes go through to persistent storage as fire-and-forget background tasks, and `init()`
/// hydrates memory once so configuration survives process restarts.
///
/// A separate instance with a separate storage namespace from the assignment cache; the two never
/// share a blob.
pub struct HybridConfigurationStore {
    memory: InMemoryConfigurationStore,
    storage: Arc<dyn PersistentStorage>,
    storage_key: String,
    hydrated: OnceCell<()>,
}

impl HybridConfigurationStore {
    /// Create a hybrid store persisting under the versioned configuration key plus the given
    /// suffix.
    pub fn new(
        storage: Arc<dyn PersistentStorage>,
        storage_key_suffix: &str,
    ) -> HybridConfigurationStore {
        HybridConfigurationStore {
            memory: InMemoryConfigurationStore::new(),
            storage,
            storage_key: crate::cache::format_storage_key(
                CONFIGURATION_STORAGE_KEY_PREFIX,
                storage_key_suffix,
            ),
            hydrated: OnceCell::new(),
        }
    }

    async fn hydrate(&self) -> Result<Option<Configuration>> {
        let Some(blob) = self.storage.get(&self.storage_key).await? else {
            return Ok(None);
        };
        let configuration =
            serde_json::from_str(&blob).map_err(|_| Error::ConfigurationParseError)?;
        Ok(Some(configuration))
    }

    fn schedule_persist(&self, configuration: Arc<Configuration>) {
        let storage = Arc::clone(&self.storage);
        let storage_key = self.storage_key.clone();
        crate::cache::spawn_detached("configuration persistence", async move {
            let blob = match serde_json::to_string(&*configuration) {
                Ok(blob) => blob,
                Err(err) => {
                    log::warn!(target: "eppo", "failed to serialize configuration: {:?}", err);
                    return;
                }
            };
            if let Err(err) = storage.set(&storage_key, &blob).await {
                let storage_key = storage_key.as_str();
                log::warn!(target: "eppo",
                           storage_key;
                           "failed to persist configuration: {:?}", err);
            }
        });
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for HybridConfigurationStore {
    /// Hydrates the memory tier from persistent storage. A missing, malformed, or unreadable
    /// blob hydrates to "no configuration"; readers then see `None` until the next
    /// `set_configuration`.
    async fn init(&self) {
        self.hydrated
            .get_or_init(|| async {
                match self.hydrate().await {
                    Ok(Some(configuration)) => {
                        // A fetched configuration may have arrived while hydration was in
                        // flight; it is fresher than the persisted one.
                        if self.memory.get_configuration().is_none() {
                            self.memory.set_arc(Arc::new(configuration));
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        let storage_key = self.storage_key.as_str();
                        log::warn!(target: "eppo",
                                   storage_key;
                                   "failed to hydrate configuration, starting empty: {:?}", err);
                    }
                }
            })
            .await;
    }

    fn get_configuration(&self) -> Option<Arc<Configuration>> {
        self.memory.get_configuration()
    }

    fn set_configuration(&self, configuration: Configuration) {
        let configuration = Arc::new(configuration);
        self.memory.set_arc(configuration.clone());
        self.schedule_persist(configuration);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::cache::test_helpers::FakeStorage;

    use super::*;

    fn sample_configuration() -> Configuration {
        serde_json::from_str(
            r#"{"flags": {"flag-1": {
                "key": "flag-1",
                "enabled": true,
                "variationType": "BOOLEAN",
                "variations": {"on": {"key": "on", "value": true}},
                "allocations": [{"key": "allocation-1"}]
            }}}"#,
        )
        .unwrap()
    }

    #[test]
    fn can_set_configuration_from_another_thread() {
        let store = Arc::new(InMemoryConfigurationStore::new());

        assert!(store.get_configuration().is_none());

        {
            let store = store.clone();
            let _ = std::thread::spawn(move || {
                store.set_configuration(sample_configuration());
            })
            .join();
        }

        assert!(store.get_configuration().is_some());
    }

    #[tokio::test]
    async fn configuration_survives_simulated_restart() {
        let storage = Arc::new(FakeStorage::default());

        {
            let store = HybridConfigurationStore::new(storage.clone(), "abcd1234");
            store.init().await;
            store.set_configuration(sample_configuration());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(storage
            .store
            .lock()
            .unwrap()
            .contains_key("eppo-configuration-v1-abcd1234"));

        let store = HybridConfigurationStore::new(storage, "abcd1234");
        assert!(store.get_configuration().is_none());
        store.init().await;

        let configuration = store.get_configuration().expect("hydrated configuration");
        assert!(configuration.get_flag("flag-1").is_some());
    }

    #[tokio::test]
    async fn malformed_persisted_configuration_hydrates_empty() {
        let storage = Arc::new(FakeStorage::default());
        storage.store.lock().unwrap().insert(
            "eppo-configuration-v1-test".to_owned(),
            "not json".to_owned(),
        );

        let store = HybridConfigurationStore::new(storage, "test");
        store.init().await;
        assert!(store.get_configuration().is_none());
    }

    #[tokio::test]
    async fn fetched_configuration_beats_hydrated_one() {
        let storage = Arc::new(FakeStorage::default());
        {
            let store = HybridConfigurationStore::new(storage.clone(), "test");
            store.set_configuration(sample_configuration());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let store = HybridConfigurationStore::new(storage, "test");
        // A fetch lands before init() resolves.
        store.set_configuration(Configuration::default());
        store.init().await;

        let configuration = store.get_configuration().unwrap();
        assert!(configuration.is_empty());
    }
}
