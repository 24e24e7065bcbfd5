//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Built-in defaults
//! 2. Config file (`<config dir>/hopper.yaml`)
//! 3. Environment variables (`HOPPER_*` prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::{RetryPoliciesConfig, UpdaterConfig};
use camino::{Utf8Path, Utf8PathBuf};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Name of the config file inside the config directory
pub const CONFIG_FILE_NAME: &str = "hopper.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the platform config directory
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a loader for a directory the user named explicitly
    ///
    /// Unlike the platform default, an explicit directory must exist.
    pub fn with_existing_dir(config_dir: Utf8PathBuf) -> Result<Self> {
        if !config_dir.exists() {
            return Err(Error::config_not_found(config_dir.as_str()));
        }
        if !config_dir.is_dir() {
            return Err(Error::invalid_directory(
                config_dir.as_str(),
                "not a directory",
            ));
        }
        Ok(Self::with_dir(config_dir))
    }

    /// Platform config directory (`~/.config/hopper` on Linux)
    fn default_config_dir() -> Result<Utf8PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine config directory"))?;

        Utf8PathBuf::from_path_buf(base.join("hopper"))
            .map_err(|p| Error::invalid_config(format!("Config path is not UTF-8: {:?}", p)))
    }

    /// Load the updater configuration with hierarchical precedence
    pub fn load(&self) -> Result<UpdaterConfig> {
        let mut config = UpdaterConfig::default();

        let config_path = self.config_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            debug!("Loading config file: {}", config_path);
            let file_config = self.load_yaml_file::<UpdaterConfig>(&config_path)?;
            config = Self::merge(config, file_config);
        }

        self.apply_env_overrides(config)
    }

    /// Load a YAML file and parse it
    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge two configs (base is overridden by overlay)
    fn merge(base: UpdaterConfig, overlay: UpdaterConfig) -> UpdaterConfig {
        UpdaterConfig {
            github: overlay.github,
            network: overlay.network,
            update: overlay.update,
            retry_policies: Self::merge_retry_policies(base.retry_policies, overlay.retry_policies),
        }
    }

    /// Per-operation policies from the overlay win; the rest are kept
    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        for (key, policy) in overlay.operations {
            base.operations.insert(key, policy);
        }
        base.default = overlay.default;
        base
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: UpdaterConfig) -> Result<UpdaterConfig> {
        if let Ok(val) = env::var("HOPPER_GITHUB_API_URL") {
            config.github.api_url = val;
        }

        if let Ok(val) = env::var("HOPPER_GITHUB_REPO_OWNER") {
            config.github.repo_owner = val;
        }

        if let Ok(val) = env::var("HOPPER_GITHUB_REPO_NAME") {
            config.github.repo_name = val;
        }

        if let Some(val) = parse_env("HOPPER_HTTP_TIMEOUT_SECS")? {
            config.network.http_timeout_secs = val;
        }

        if let Some(val) = parse_env("HOPPER_DOWNLOAD_TIMEOUT_SECS")? {
            config.network.download_timeout_secs = val;
        }

        if let Some(val) = parse_env("HOPPER_DOWNLOAD_CHUNK_SIZE")? {
            config.network.download_chunk_size = val;
        }

        if let Ok(val) = env::var("HOPPER_WORKING_DIR") {
            config.update.working_dir = PathBuf::from(val);
        }

        if let Some(val) = parse_env("HOPPER_INCLUDE_PRERELEASE")? {
            config.update.include_prerelease = val;
        }

        if let Some(val) = parse_env("HOPPER_UPDATE_ENABLED")? {
            config.update.enabled = val;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_config(format!("{} has an invalid value: {}", name, val))),
        Err(_) => Ok(None),
    }
}
