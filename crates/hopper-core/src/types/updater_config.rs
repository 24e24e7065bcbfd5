//! Updater configuration types
//!
//! These types control where releases are fetched from, how the network
//! client behaves, where the update chain keeps its files and how
//! contended file operations are retried.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Complete updater configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdaterConfig {
    /// Release host settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Update chain settings
    #[serde(default)]
    pub update: UpdateSettings,

    /// Retry policy configurations
    #[serde(default)]
    pub retry_policies: RetryPoliciesConfig,
}

impl UpdaterConfig {
    /// Retry policy for a named operation, falling back to the default policy
    pub fn retry_policy(&self, operation: &str) -> RetryPolicy {
        self.retry_policies
            .operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| self.retry_policies.default.clone())
    }
}

/// GitHub-style release host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// Base URL for the releases API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Repository owner (author)
    #[serde(default = "default_repo_owner")]
    pub repo_owner: String,

    /// Repository name
    #[serde(default = "default_repo_name")]
    pub repo_name: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            repo_owner: default_repo_owner(),
            repo_name: default_repo_name(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_repo_owner() -> String {
    "hopper-rs".to_string()
}
fn default_repo_name() -> String {
    "hopper".to_string()
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Timeout for release metadata requests
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Timeout for the whole asset download
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Write chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub download_chunk_size: usize,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            download_chunk_size: default_chunk_size(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}
fn default_download_timeout() -> u64 {
    300 // 5 minutes
}
fn default_chunk_size() -> usize {
    4 * 1024
}
fn default_user_agent() -> String {
    format!(
        "hopper/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Settings for the relaunch chain itself
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdateSettings {
    /// Directory holding the staging file and session logs
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// File name of the downloaded executable inside `working_dir`
    #[serde(default = "default_staging_file_name")]
    pub staging_file_name: String,

    /// Consider pre-releases when looking for the latest release
    #[serde(default)]
    pub include_prerelease: bool,

    /// Master switch for the availability check
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            working_dir: default_working_dir(),
            staging_file_name: default_staging_file_name(),
            include_prerelease: false,
            enabled: default_enabled(),
        }
    }
}

fn default_working_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("hopper")
}
fn default_staging_file_name() -> String {
    format!("hopper-staged{}", std::env::consts::EXE_SUFFIX)
}
fn default_enabled() -> bool {
    true
}

/// Retry policy configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    /// Default retry policy
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation retry policies
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl Default for RetryPoliciesConfig {
    fn default() -> Self {
        // The executable being replaced may still be held open by the
        // previous process for a few milliseconds after it exits.
        let contended = RetryPolicy {
            max_attempts: 5,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 1.0,
            initial_delay_ms: 50,
            max_delay_ms: 50,
            jitter: true,
        };

        let mut operations = HashMap::new();
        operations.insert("replace".to_string(), contended.clone());
        operations.insert("remove".to_string(), contended);

        Self {
            default: RetryPolicy::default(),
            operations,
        }
    }
}

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry strategy
    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Backoff multiplier for exponential strategies
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Add up to 25% random extra delay so competing processes drift apart
    #[serde(default)]
    pub jitter: bool,
}

impl RetryPolicy {
    /// Fixed delay between a bounded number of attempts
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 1.0,
            initial_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            jitter: false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            jitter: false,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    200
}
fn default_max_delay() -> u64 {
    5000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    /// No delay between attempts
    None,

    /// Fixed delay between attempts
    FixedDelay,

    /// Exponential backoff (default)
    #[default]
    ExponentialBackoff,

    /// Linear backoff
    LinearBackoff,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpdaterConfig::default();
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.network.download_chunk_size, 4096);
        assert!(config.update.enabled);
        assert!(!config.update.include_prerelease);
        assert!(config
            .update
            .staging_file_name
            .starts_with("hopper-staged"));
    }

    #[test]
    fn test_replace_policy_defaults() {
        let config = UpdaterConfig::default();
        let policy = config.retry_policy("replace");
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.strategy, RetryStrategy::FixedDelay);
        assert_eq!(policy.initial_delay_ms, 50);
        assert!(policy.jitter);
        assert_eq!(config.retry_policy("remove"), policy);
    }

    #[test]
    fn test_unknown_operation_falls_back_to_default() {
        let config = UpdaterConfig::default();
        assert_eq!(config.retry_policy("frobnicate"), RetryPolicy::default());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
github:
  repo-owner: someone
update:
  include-prerelease: true
"#;
        let config: UpdaterConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.github.repo_owner, "someone");
        assert_eq!(config.github.repo_name, "hopper");
        assert!(config.update.include_prerelease);
        assert_eq!(config.network.http_timeout_secs, 30);
    }

    #[test]
    fn test_retry_policy_serialization() {
        let policy = RetryPolicy::fixed(4, 25);
        let yaml = serde_yaml_ng::to_string(&policy).unwrap();
        assert!(yaml.contains("max-attempts: 4"));
        assert!(yaml.contains("strategy: fixed-delay"));
        assert!(yaml.contains("jitter: false"));
    }
}
