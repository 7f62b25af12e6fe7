//! Catalog file: the TOML description of available pipelines.
//!
//! ```toml
//! [[pipeline]]
//! name = "fact_sales"
//! command = "python -m pipelines.fact_sales"
//! depends_on = ["dim_date", "dim_customer", "dim_product", "dim_seller"]
//! retries = 2
//! retry_delay_secs = 300
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{expand_tilde, Config};
use crate::core::registry::TaskRegistry;
use crate::core::task::{RetryPolicy, Task};
use crate::error::{Error, Result};
use crate::elog_debug;
use crate::pipelines::command::CommandWork;

/// One `[[pipeline]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineEntry {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

impl PipelineEntry {
    pub fn new(name: &str, command: &str, depends_on: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            retries: None,
            retry_delay_secs: None,
            timeout_secs: None,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Retry policy, falling back to the config defaults per field.
    pub fn retry_policy(&self, config: &Config) -> RetryPolicy {
        RetryPolicy::new(
            self.retries.unwrap_or(config.default_retries),
            Duration::from_secs(
                self.retry_delay_secs
                    .unwrap_or(config.default_retry_delay_secs),
            ),
        )
    }

    pub fn timeout(&self, config: &Config) -> Option<Duration> {
        self.timeout_secs
            .map(Duration::from_secs)
            .or_else(|| config.default_timeout())
    }

    fn to_task(&self, config: &Config) -> Task {
        let mut work = CommandWork::new(&self.command).with_env(self.env.clone());
        if let Some(dir) = &self.working_dir {
            work = work.with_working_dir(expand_tilde(dir));
        }
        Task::new(&self.name, self.depends_on.iter().cloned(), Arc::new(work))
            .with_retry(self.retry_policy(config))
            .with_timeout(self.timeout(config))
    }
}

/// Parsed catalog file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default, rename = "pipeline")]
    pub pipelines: Vec<PipelineEntry>,
}

impl CatalogFile {
    pub fn load(path: &Path) -> Result<Self> {
        elog_debug!("CatalogFile::load path={}", path.display());
        if !path.exists() {
            return Err(Error::CatalogNotFound(path.to_path_buf()));
        }
        let catalog = Self::parse(&fs::read_to_string(path)?)?;
        elog_debug!("Catalog loaded: {} pipelines", catalog.pipelines.len());
        Ok(catalog)
    }

    /// Pick the catalog for a run: an explicit path, else the configured
    /// one, else the built-in warehouse catalog.
    pub fn resolve(explicit: Option<&Path>, config: &Config) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match config.catalog_path() {
            Some(path) => Self::load(&path),
            None => {
                elog_debug!("No catalog configured, using built-in warehouse catalog");
                Ok(crate::pipelines::warehouse::default_catalog())
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Field-level checks. Duplicate names and dangling dependencies are
    /// left to the registry.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.pipelines {
            if entry.name.trim().is_empty() {
                return Err(Error::Validation("pipeline name must not be empty".to_string()));
            }
            if entry.name == "all" {
                return Err(Error::Validation(
                    "'all' is reserved and cannot be a pipeline name".to_string(),
                ));
            }
            if entry.command.trim().is_empty() {
                return Err(Error::Validation(format!(
                    "pipeline {} has an empty command",
                    entry.name
                )));
            }
        }
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.pipelines.iter().map(|p| p.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&PipelineEntry> {
        self.pipelines.iter().find(|p| p.name == name)
    }

    /// Register every entry, in file order, as a command-backed task.
    pub fn into_registry(&self, config: &Config) -> Result<TaskRegistry> {
        let mut registry = TaskRegistry::new();
        for entry in &self.pipelines {
            registry.register_task(entry.to_task(config))?;
        }
        Ok(registry)
    }
}
