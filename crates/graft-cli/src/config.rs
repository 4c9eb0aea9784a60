//! User configuration file.

use anyhow::{Context, Result};
use rhi_graft_core::EngineOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default CLI options.
    pub defaults: Defaults,
    /// Interpreter limits for jobs that do not set their own.
    pub engine: Option<EngineOptions>,
}

/// Default CLI options.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Enable verbose output by default.
    pub verbose: bool,
    /// Enable quiet output by default.
    pub quiet: bool,
    /// Default worker thread count for `run`.
    pub threads: Option<usize>,
    /// Default handling of failing records for `run`.
    pub on_error: Option<OnError>,
}

/// What `run` does when a record fails to transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    /// Abort the run.
    #[default]
    Fail,
    /// Log the failure and continue with the next record.
    Skip,
}

impl Config {
    /// Load config from the default location (`<config_dir>/graft/config.toml`).
    ///
    /// A missing file is not an error.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("graft").join("config.toml"))
    }
}
