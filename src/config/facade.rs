//! ConfigLoader facade delegating to the merge service.

use super::merge::service::MergeService;
use super::PortalConfig;
use config::ConfigError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults and environment.
    pub fn load() -> Result<PortalConfig, ConfigError> {
        MergeService::load(None)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<PortalConfig, ConfigError> {
        MergeService::load(Some(path))
    }

    /// Create default configuration.
    pub fn default() -> PortalConfig {
        PortalConfig::default()
    }
}
