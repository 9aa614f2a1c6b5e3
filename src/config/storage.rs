//! RRD storage configuration.
//!
//! The reaper never writes series files; it only needs to know the base
//! directory the graph writers shard them under.
//!
//! # Example Configuration
//!
//! ```toml
//! [storage]
//! path = "/home/work/data/6070"
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Location of the on-disk series files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RrdStorageConfig {
    /// Base directory holding the `<shard>/<checksum>_<type>_<step>.rrd` tree.
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,
}

impl Default for RrdStorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./data/6070")
}

impl RrdStorageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.path cannot be empty".into(),
            ));
        }
        Ok(())
    }
}
