//! Error types
//!
//! `ResourceError` is the closed set handed to the routing layer. `StorageError`
//! stays behind the storage adapter seam and is converted on the way out.

use thiserror::Error;

/// Errors surfaced by the resource manager, cache and vote ledger
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Internal only. A patch found the cache disagreeing with the provider.
    #[error("Inconsistent cache: {0}")]
    InconsistentCache(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The caller's download sink stopped accepting bytes
    #[error("Download sink closed: {0}")]
    SinkClosed(String),
}

/// Errors raised by storage adapter implementations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Node not found upstream: {0}")]
    NotFound(String),

    #[error("Name already taken upstream: {0}")]
    Conflict(String),

    #[error("Storage provider unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for ResourceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => ResourceError::NotFound(msg),
            StorageError::Conflict(msg) => ResourceError::Conflict(msg),
            StorageError::Unavailable(msg) => ResourceError::ProviderUnavailable(msg),
            StorageError::Io(e) => ResourceError::ProviderUnavailable(e.to_string()),
        }
    }
}

/// Errors raised while wiring the process together (config, logging, stores)
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Vote store unavailable: {0}")]
    VoteStore(String),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ResourceError),
}

impl From<sled::Error> for ResourceError {
    fn from(err: sled::Error) -> Self {
        ResourceError::ProviderUnavailable(format!("vote store: {}", err))
    }
}

impl From<bincode::Error> for ResourceError {
    fn from(err: bincode::Error) -> Self {
        ResourceError::ProviderUnavailable(format!("vote record encoding: {}", err))
    }
}
