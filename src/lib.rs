//! StudyHub: Resource Hierarchy and Vote Core
//!
//! Mirrors an external folder/file provider for four collection roots, keeps
//! that mirror current by patching it after each write, and tracks per-file
//! votes. [`ResourceManager`] is the single entry point.

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod storage;
pub mod tooling;
pub mod tree;
pub mod types;
pub mod votes;

pub use error::{ResourceError, StartupError, StorageError};
pub use manager::ResourceManager;
pub use types::{CollectionRoot, Identity, NodeId};
