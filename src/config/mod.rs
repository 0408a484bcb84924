// ABOUTME: Configuration types and parsing for stackyard.yml.
// ABOUTME: Database location, naming prefix, runtime override, timeouts and worker pacing.

mod init;
mod timeouts;

pub use init::init_config;
pub use timeouts::{Timeouts, WorkerConfig};

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::stack::Naming;
use crate::types::StackId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "stackyard.yml";
pub const CONFIG_FILENAME_ALT: &str = "stackyard.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".stackyard/config.yml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// SQLite database file. Relative paths resolve against the directory the
    /// configuration was discovered in.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Prefix for runtime object names and label keys.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsConfig {
    /// Command log lines returned when no limit is given.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from(".stackyard/stackyard.db")
}

fn default_prefix() -> String {
    "stackyard".to_string()
}

fn default_page_size() -> usize {
    200
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            prefix: default_prefix(),
            runtime: RuntimeConfig::default(),
            timeouts: Timeouts::default(),
            worker: WorkerConfig::default(),
            logs: LogsConfig::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file is a valid, all-defaults configuration.
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    /// Find a configuration file in `dir`, falling back to defaults when
    /// there is none.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            (dir.join(CONFIG_FILENAME), dir.to_path_buf()),
            (dir.join(CONFIG_FILENAME_ALT), dir.to_path_buf()),
            (dir.join(CONFIG_FILENAME_DIR), dir.to_path_buf()),
        ];

        for (path, base) in &candidates {
            if path.exists() {
                tracing::debug!(path = %path.display(), "Loading configuration");
                let content = std::fs::read_to_string(path)?;
                let mut config = Self::from_yaml(&content)?;
                config.resolve_paths(base);
                return Ok(config);
            }
        }

        let mut config = Config::default();
        config.resolve_paths(dir);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.database.is_relative() {
            self.database = base.join(&self.database);
        }
    }

    fn validate(&self) -> Result<()> {
        // The prefix must be usable as the start of a stack name.
        StackId::new(&self.prefix)
            .map_err(|e| Error::InvalidConfig(format!("prefix: {e}")))?;
        if self.logs.page_size == 0 {
            return Err(Error::InvalidConfig(
                "logs.page_size must be at least 1".to_string(),
            ));
        }
        self.timeouts.validate()?;
        self.worker.validate()?;
        Ok(())
    }

    pub fn naming(&self) -> Naming {
        Naming::new(&self.prefix)
    }
}
