use std::sync::Arc;

use thiserror::Error;

/// Result type used throughout the SDK.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the Eppo SDK.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// API key is required to namespace persistent storage and talk to Eppo.
    #[error("api_key is required and cannot be blank")]
    EmptyApiKey,

    /// Persisted configuration blob failed to parse. Usually means the cache
    /// format changed between SDK versions.
    #[error("error parsing persisted configuration, try upgrading Eppo SDK")]
    ConfigurationParseError,

    /// Persisted assignment cache blob failed to parse.
    #[error("error parsing persisted assignment cache")]
    CacheParseError,

    /// Error returned by the host-supplied persistent storage.
    #[error("persistent storage error: {0}")]
    Storage(Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a host storage error into [`Error::Storage`].
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Error {
        Error::Storage(Arc::new(err))
    }
}

