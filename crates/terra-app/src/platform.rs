//! OS-specific directories for configuration, logs and textures.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("could not determine OS configuration directory")]
    NoConfigDir,
    #[error("platform I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Where the viewer keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformDirs {
    /// `terra.ron` lives here.
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Default texture root when the config names a relative one.
    pub assets_dir: PathBuf,
}

const APP_NAME: &str = "terra";

impl PlatformDirs {
    /// Resolve platform-specific directories without creating them on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::NoConfigDir`] if the OS does not expose a
    /// configuration directory.
    pub fn resolve() -> Result<Self, PlatformError> {
        let app_config = dirs::config_dir()
            .ok_or(PlatformError::NoConfigDir)?
            .join(APP_NAME);
        let data_dir = dirs::data_dir()
            .map(|d| d.join(APP_NAME))
            .unwrap_or_else(|| app_config.clone());
        Ok(Self {
            log_dir: app_config.join("logs"),
            config_dir: app_config,
            assets_dir: data_dir.join("textures"),
        })
    }

    /// Resolve directories under `config_dir` instead of the OS location.
    pub fn with_config_dir(config_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            log_dir: config_dir.join("logs"),
            assets_dir: config_dir.join("textures"),
        }
    }

    /// Create all directories on disk.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Io`] if any directory cannot be created.
    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(&self.assets_dir)?;
        Ok(())
    }

    /// Base directory texture paths are resolved against. A relative
    /// texture root is looked up under [`assets_dir`](Self::assets_dir)
    /// first and falls back to the working directory.
    pub fn asset_base(&self, texture_root: &str) -> PathBuf {
        let root = Path::new(texture_root);
        if !root.is_absolute() && self.assets_dir.join(root).is_dir() {
            self.assets_dir.clone()
        } else {
            PathBuf::from(".")
        }
    }
}
