//! TOML configuration for the `ncd` command.

use std::io::Write;
use std::path::Path;

use ncd_core::worker_client::{DEFAULT_WORKER_COMMAND, WORKER_ENV};
use ncd_core::worker_ipc::DEFAULT_MAX_FRAME_BYTES;
use ncd_core::{NcdConfig, WorkerConfig};
use serde::Deserialize;
use thiserror::Error;

/// Top-level CLI configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CliConfig {
    /// Distance settings.
    #[serde(default)]
    pub ncd: NcdConfig,
    /// Worker process.
    #[serde(default)]
    pub worker: WorkerSection,
}

/// `[worker]` table.
#[derive(Clone, Debug, Deserialize)]
pub struct WorkerSection {
    /// Worker binary.
    #[serde(default)]
    pub command: Option<String>,
    /// Extra worker arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Max frame size in both directions.
    #[serde(default = "default_max_frame")]
    pub max_frame_bytes: usize,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            max_frame_bytes: default_max_frame(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&data)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        toml::from_str::<Self>(data).map_err(ConfigError::Toml)
    }

    /// Worker settings with the command resolved as flag, then `NCD_WORKER`,
    /// then the config file, then the default binary name.
    #[must_use]
    pub fn worker_config(&self, flag: Option<&str>) -> WorkerConfig {
        self.worker_config_with_env(flag, std::env::var(WORKER_ENV).ok())
    }

    fn worker_config_with_env(&self, flag: Option<&str>, env: Option<String>) -> WorkerConfig {
        let command = flag
            .map(str::to_owned)
            .into_iter()
            .chain(env)
            .chain(self.worker.command.clone())
            .find(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_WORKER_COMMAND.to_owned());
        WorkerConfig {
            command,
            args: self.worker.args.clone(),
            max_frame_bytes: self.worker.max_frame_bytes,
        }
    }
}

/// Embedded example configuration template.
pub const EXAMPLE_CONFIG_TOML: &str = include_str!("../ncd.example.toml");

/// Writes the embedded example config to `path`.
pub fn write_example_config(path: impl AsRef<Path>, overwrite: bool) -> Result<(), std::io::Error> {
    if overwrite {
        return std::fs::write(path, EXAMPLE_CONFIG_TOML);
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(EXAMPLE_CONFIG_TOML.as_bytes())
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File read error.
    #[error("failed to read config file: {0}")]
    Io(std::io::Error),
    /// TOML parse error.
    #[error("failed to parse config toml: {0}")]
    Toml(toml::de::Error),
}

fn default_max_frame() -> usize {
    DEFAULT_MAX_FRAME_BYTES
}
