use std::collections::HashMap;
use std::sync::Arc;

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::assignment_logger::NoopAssignmentLogger;
use crate::cache::{
    assignment_cache_factory, storage_key_suffix_from_api_key, AssignmentCache,
    AssignmentCacheKey, AssignmentCacheOptions, PersistentStorage,
};
use crate::configuration_store::{
    ConfigurationStore, HybridConfigurationStore, InMemoryConfigurationStore,
};
use crate::events::AssignmentEvent;
use crate::{AssignmentLogger, Configuration, Error, Result};

/// Configuration for [`EppoClient`].
///
/// # Examples
/// ```
/// # use eppo_client::ClientConfig;
/// let client = ClientConfig::from_api_key("api-key")
///     .assignment_logger(|event| {
///         println!("{:?}", event);
///     })
///     .to_client();
/// ```
pub struct ClientConfig<'a> {
    pub(crate) api_key: String,
    pub(crate) assignment_logger: Box<dyn AssignmentLogger + Send + Sync + 'a>,
    pub(crate) persistent_storage: Option<Arc<dyn PersistentStorage>>,
    pub(crate) force_memory_only: bool,
    pub(crate) max_cached_assignments: Option<usize>,
}

impl<'a> ClientConfig<'a> {
    /// Create a default Eppo configuration using the specified API key.
    ///
    /// ```
    /// # use eppo_client::ClientConfig;
    /// ClientConfig::from_api_key("api-key");
    /// ```
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            assignment_logger: Box::new(NoopAssignmentLogger),
            persistent_storage: None,
            force_memory_only: false,
            max_cached_assignments: None,
        }
    }

    /// Set assignment logger to pass variation assignments to your data warehouse.
    ///
    /// ```
    /// # use eppo_client::ClientConfig;
    /// let config = ClientConfig::from_api_key("api-key").assignment_logger(|event| {
    ///   println!("{:?}", event);
    /// });
    /// ```
    pub fn assignment_logger(
        mut self,
        assignment_logger: impl AssignmentLogger + Send + Sync + 'a,
    ) -> Self {
        self.assignment_logger = Box::new(assignment_logger);
        self
    }

    /// Supply a persistent storage capability, enabling assignment deduplication and
    /// configuration to survive process restarts. Without it, the client runs memory-only.
    pub fn persistent_storage(mut self, storage: Arc<dyn PersistentStorage>) -> Self {
        self.persistent_storage = Some(storage);
        self
    }

    /// Run memory-only even if persistent storage is available.
    pub fn force_memory_only(mut self, force_memory_only: bool) -> Self {
        self.force_memory_only = force_memory_only;
        self
    }

    /// Bound the memory-only assignment dedup cache to this many slots, evicting the least
    /// recently used. Unbounded by default.
    pub fn max_cached_assignments(mut self, max_cached_assignments: usize) -> Self {
        self.max_cached_assignments = Some(max_cached_assignments);
        self
    }

    /// Create a new [`EppoClient`] using the specified configuration.
    pub fn to_client(self) -> Result<EppoClient<'a>> {
        EppoClient::new(self)
    }
}

/// A client for the Eppo API.
///
/// The client is an owned instance: construct one with [`ClientConfig`], keep it wherever your
/// application keeps long-lived state, and pass it to whatever consumes assignments. Multiple
/// independent clients can live side by side—each namespaces its persistent storage by its API
/// key, so they don't corrupt each other. Two clients with the *same* API key share a storage
/// namespace and must not be live at the same time.
///
/// Flag evaluation itself is owned by an external evaluation engine: the engine reads the current
/// configuration through [`EppoClient::configuration`], computes the assignment, and reports it
/// through [`EppoClient::log_assignment`], which deduplicates before forwarding to the
/// [`AssignmentLogger`].
pub struct EppoClient<'a> {
    configuration_store: Arc<dyn ConfigurationStore>,
    assignment_cache: Arc<dyn AssignmentCache>,
    assignment_logger: Box<dyn AssignmentLogger + Send + Sync + 'a>,
}

impl<'a> EppoClient<'a> {
    /// Create a new `EppoClient` using the specified configuration.
    ///
    /// No I/O happens here; call [`EppoClient::init`] to hydrate persisted state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyApiKey`] if the API key is blank.
    pub fn new(config: ClientConfig<'a>) -> Result<EppoClient<'a>> {
        if config.api_key.trim().is_empty() {
            return Err(Error::EmptyApiKey);
        }

        let storage_key_suffix = storage_key_suffix_from_api_key(&config.api_key);

        let assignment_cache = assignment_cache_factory(
            AssignmentCacheOptions {
                force_memory_only: config.force_memory_only,
                storage_key_suffix: storage_key_suffix.clone(),
                max_entries: config.max_cached_assignments,
            },
            config.persistent_storage.clone(),
        );

        let configuration_store: Arc<dyn ConfigurationStore> =
            match (&config.persistent_storage, config.force_memory_only) {
                (Some(storage), false) => Arc::new(HybridConfigurationStore::new(
                    storage.clone(),
                    &storage_key_suffix,
                )),
                _ => Arc::new(InMemoryConfigurationStore::new()),
            };

        Ok(EppoClient {
            configuration_store,
            assignment_cache,
            assignment_logger: config.assignment_logger,
        })
    }

    /// Hydrate persisted state (configuration and assignment dedup history) into memory.
    ///
    /// This is the only operation worth awaiting before relying on cross-restart behavior.
    /// Everything else works without it—evaluation-side calls are never blocked on storage I/O,
    /// they just don't see the previous process's state until hydration resolves.
    pub async fn init(&self) {
        self.configuration_store.init().await;
        self.assignment_cache.init().await;
        log::debug!(target: "eppo", "client hydrated from persistent storage");
    }

    /// Get the currently-active configuration snapshot for the evaluation engine. Returns `None`
    /// if configuration hasn't been fetched or hydrated yet.
    pub fn configuration(&self) -> Option<Arc<Configuration>> {
        self.configuration_store.get_configuration()
    }

    /// Store a freshly fetched configuration, replacing the previous one. The write is mirrored
    /// to persistent storage in the background.
    pub fn set_configuration(&self, configuration: Configuration) {
        self.configuration_store.set_configuration(configuration);
    }

    /// Report an assignment computed by the evaluation engine.
    ///
    /// Forwards the event to the [`AssignmentLogger`] unless the same subject already received
    /// the same variation from the same allocation of the same flag. A *changed* variation for a
    /// previously logged combination is logged again—the event stream is the audit signal the
    /// analytics pipeline depends on.
    pub fn log_assignment(&self, event: AssignmentEvent) {
        let key = AssignmentCacheKey::from(&event);
        if self.assignment_cache.has(&key) {
            log::trace!(target: "eppo",
                        flag_key = key.flag_key.as_str(),
                        subject_key = key.subject_key.as_str(),
                        variation_key = key.variation_key.as_str();
                        "skipping previously logged assignment");
            return;
        }
        self.assignment_cache.set(&key);

        log::trace!(target: "eppo",
                    event:serde;
                    "logging assignment");
        self.assignment_logger.log_assignment(event);
    }

    /// Drops all dedup history, in memory and in persistent storage. Every subsequent assignment
    /// logs again as if never seen.
    pub async fn clear_assignment_cache(&self) {
        self.assignment_cache.clear().await;
    }
}

/// Type alias for a subject's attributes.
pub type SubjectAttributes = HashMap<String, AttributeValue>;

/// Value of a subject attribute, attached to assignment events for analysis.
#[derive(Debug, Serialize, Deserialize, PartialEq, PartialOrd, From, Clone)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A string value.
    String(String),
    /// A numerical value.
    Number(f64),
    /// A boolean value.
    Boolean(bool),
    /// A null value or absence of value.
    Null,
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
