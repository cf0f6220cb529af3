//! Configuration
//!
//! `PortalConfig` is assembled by [`ConfigLoader`] from defaults, an optional
//! TOML file and `STUDYHUB_<SECTION>__<KEY>` environment variables.

pub mod facade;
pub mod merge;
pub mod sources;

pub use facade::ConfigLoader;

use crate::error::{ResourceError, StartupError};
use crate::logging::LoggingConfig;
use crate::types::{CollectionRoot, NodeId};
use crate::votes::{MemoryVoteStore, SledVoteStore, VoteStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub collections: CollectionRoots,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub votes: VotesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider ids of the four collection roots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionRoots {
    pub academic_resources: NodeId,
    pub faculty_directory: NodeId,
    pub schedules: NodeId,
    pub timetables: NodeId,
}

impl CollectionRoots {
    pub fn get(&self, root: CollectionRoot) -> &NodeId {
        match root {
            CollectionRoot::AcademicResources => &self.academic_resources,
            CollectionRoot::FacultyDirectory => &self.faculty_directory,
            CollectionRoot::Schedules => &self.schedules,
            CollectionRoot::Timetables => &self.timetables,
        }
    }

    /// Every root id must be set and distinct
    pub fn validate(&self) -> Result<(), ResourceError> {
        let mut seen = std::collections::HashSet::new();
        for root in CollectionRoot::ALL {
            let id = self.get(root);
            if id.as_str().trim().is_empty() {
                return Err(ResourceError::InvalidInput(format!(
                    "collection root for {} is not configured",
                    root
                )));
            }
            if !seen.insert(id) {
                return Err(ResourceError::InvalidInput(format!(
                    "collection root id {} is used twice",
                    id
                )));
            }
        }
        Ok(())
    }
}

impl Default for CollectionRoots {
    fn default() -> Self {
        Self {
            academic_resources: NodeId::from("academic-resources"),
            faculty_directory: NodeId::from("faculty-directory"),
            schedules: NodeId::from("schedules"),
            timetables: NodeId::from("timetables"),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_chunk_size() -> usize {
    64 * 1024
}

/// Storage adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Deadline for every adapter call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Chunk size for streamed transfers
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

/// Where vote records live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteBackend {
    #[default]
    Memory,
    Sled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VotesConfig {
    #[serde(default)]
    pub backend: VoteBackend,

    /// Sled directory; None means the platform data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl VotesConfig {
    pub fn resolve_path(&self) -> Result<PathBuf, StartupError> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let dirs = directories::ProjectDirs::from("", "studyhub", "studyhub").ok_or_else(|| {
            StartupError::VoteStore(
                "Could not determine platform data directory for the vote store".to_string(),
            )
        })?;
        Ok(dirs.data_dir().join("votes"))
    }

    /// Open the configured backing store
    pub fn open_store(&self) -> Result<Arc<dyn VoteStore>, StartupError> {
        match self.backend {
            VoteBackend::Memory => Ok(Arc::new(MemoryVoteStore::new())),
            VoteBackend::Sled => {
                let path = self.resolve_path()?;
                let store = SledVoteStore::open(&path).map_err(|e| {
                    StartupError::VoteStore(format!("{}: {}", path.display(), e))
                })?;
                Ok(Arc::new(store))
            }
        }
    }
}
