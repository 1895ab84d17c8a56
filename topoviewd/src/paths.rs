//! Cross-platform application paths

use std::path::{Path, PathBuf};

use crate::error::DaemonError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
}

impl AppPaths {
    /// `TOPOVIEW_CONFIG_DIR` wins over the platform config directory.
    pub fn new() -> Result<Self, DaemonError> {
        if let Ok(dir) = std::env::var("TOPOVIEW_CONFIG_DIR") {
            return Ok(Self::from_dir(dir));
        }
        let base = dirs::config_dir()
            .ok_or_else(|| DaemonError::Config("Could not determine config directory".into()))?;
        Ok(Self::from_dir(base.join("topoview")))
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }
}
