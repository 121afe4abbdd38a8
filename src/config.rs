//! Core ambient settings: concurrency, retry/backoff, and logging defaults.
//!
//! Narrowed from the teacher's monolithic `Config` (which also carried
//! GitHub auth and daemon settings — both superseded by
//! [`crate::provider_store`] and dropped respectively) down to the settings
//! genuinely shared by the resolver, engine, and rate-limit gate. Keeps the
//! teacher's `serde_yaml` + `dirs` + `shellexpand` load/save idiom.

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for a single `mgit` invocation.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Base directory repositories are cloned under.
    #[serde(default = "default_base_directory")]
    pub base_directory: String,

    /// Directory layout: hierarchical (`host/org/repo`) vs. flat (`repo`,
    /// collision-resolved).
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Bulk operation engine concurrency/retry/timeout settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Rate-limit gate defaults, shared by every provider instance.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LayoutConfig {
    /// `true` selects the flat, collision-resolved layout; `false` (default)
    /// selects the hierarchical `host/org/repo` layout.
    #[serde(default)]
    pub flat: bool,
}

/// Bulk operation engine settings.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Maximum number of concurrent clone/pull operations.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Per-operation timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retry attempts for a transient git failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fast-forward-only pulls; a non-fast-forward pull is recorded as a
    /// skip rather than silently merging.
    #[serde(default = "default_true")]
    pub fast_forward_only: bool,
}

/// Rate-limit gate settings. Grounded in
/// `mgit/providers/base.py`'s `_get_rate_limiter_config`.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Hard ceiling on how long a single operation will wait for a rate
    /// limit to clear before giving up.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Exponential backoff multiplier applied between retries.
    #[serde(default = "default_exponential_rate")]
    pub exponential_rate: f64,

    /// Ceiling on any single backoff sleep, regardless of retry count.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_base_directory() -> String {
    "${HOME}/repos".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_parallel() -> usize {
    4
}
fn default_timeout() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_wait_secs() -> u64 {
    300
}
fn default_exponential_rate() -> f64 {
    2.0
}
fn default_backoff_max_secs() -> f64 {
    60.0
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_parallel: default_max_parallel(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            fast_forward_only: default_true(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_wait_secs: default_max_wait_secs(),
            exponential_rate: default_exponential_rate(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            layout: LayoutConfig::default(),
            sync: SyncConfig::default(),
            rate_limit: RateLimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default config on first run.
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create config directory: {parent:?}"))?;
            }
            config.save(&config_path)?;
            tracing::info!(path = ?config_path, "created default configuration");
            Ok(config)
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {path:?}"))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {path:?}"))?;

        config.expand_paths()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file: {path:?}"))?;
        Ok(())
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let dir = config_dir().context("failed to get user config directory")?;
        Ok(dir.join("mgit").join("config.yml"))
    }

    pub fn expand_paths(&mut self) -> Result<()> {
        self.base_directory = shellexpand::full(&self.base_directory)
            .context("failed to expand base_directory path")?
            .into_owned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_values() {
        let config = Config::default();
        assert_eq!(config.sync.max_parallel, 4);
        assert_eq!(config.sync.timeout_secs, 300);
        assert!(config.sync.fast_forward_only);
        assert!(!config.layout.flat);
        assert_eq!(config.rate_limit.max_wait_secs, 300);
    }

    #[test]
    fn round_trips_through_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yml");

        let mut config = Config::default();
        config.sync.max_parallel = 8;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.sync.max_parallel, 8);
    }

    #[test]
    fn expands_home_in_base_directory() {
        std::env::set_var("HOME", "/home/testuser");
        let mut config = Config::default();
        config.base_directory = "${HOME}/repos".to_string();
        config.expand_paths().unwrap();
        assert_eq!(config.base_directory, "/home/testuser/repos");
    }
}
