use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Locations of the files hamsterbar reads.
#[derive(Debug, Clone)]
pub struct HamsterbarPaths {
    pub config_dir: PathBuf,
}

impl HamsterbarPaths {
    pub fn from_config_dir<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        if config_dir.is_file() {
            bail!("Please provide the path to the config directory, not a file within it")
        }
        if !config_dir.exists() {
            log::info!("Configuration directory {} does not exist, using default settings", config_dir.display());
        }
        Ok(HamsterbarPaths { config_dir: config_dir.to_path_buf() })
    }

    pub fn default() -> Result<Self> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(std::env::var("HOME").context("Neither XDG_CONFIG_HOME nor HOME is set")?).join(".config"),
        };
        Self::from_config_dir(config_dir.join("hamsterbar"))
    }

    pub fn get_config_dir(&self) -> &Path {
        self.config_dir.as_path()
    }

    pub fn get_settings_file(&self) -> PathBuf {
        self.config_dir.join("hamsterbar.json")
    }
}

impl std::fmt::Display for HamsterbarPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config-dir: {}, settings: {}", self.config_dir.display(), self.get_settings_file().display())
    }
}
