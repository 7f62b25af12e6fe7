use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::RetryPolicy;
use crate::{elog_debug, Error, Result};

/// Runner-wide settings from `~/.warehouse-etl/config.toml`.
///
/// The `default_*` values apply to catalog entries that leave the
/// corresponding field unset.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Catalog file used when `--catalog` is not given.
    pub catalog: Option<String>,
    #[serde(default)]
    pub default_retries: u32,
    #[serde(default)]
    pub default_retry_delay_secs: u64,
    pub default_timeout_secs: Option<u64>,
}

impl Config {
    pub fn app_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or(Error::NoHomeDir)?
            .join(".warehouse-etl"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.toml"))
    }

    /// The configured catalog path, tilde-expanded.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.as_deref().map(expand_tilde)
    }

    pub fn default_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.default_retries,
            Duration::from_secs(self.default_retry_delay_secs),
        )
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs.map(Duration::from_secs)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        elog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            elog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        elog_debug!(
            "Config loaded: catalog={:?}, retries={}, retry_delay={}s, timeout={:?}",
            config.catalog,
            config.default_retries,
            config.default_retry_delay_secs,
            config.default_timeout_secs
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        Self::ensure_dirs()?;
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, toml::to_string_pretty(self)?)?;
        elog_debug!("Config saved to {}", path.display());
        Ok(())
    }

    pub fn ensure_dirs() -> Result<()> {
        let app_dir = Self::app_dir()?;
        if !app_dir.exists() {
            elog_debug!("Creating app directory: {}", app_dir.display());
            fs::create_dir_all(&app_dir)?;
        }
        Ok(())
    }
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
