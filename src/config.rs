//! Configuration loading and management.
//!
//! Configuration is loaded with the following precedence:
//! 1. Environment variables (`CLAUDE_GUARD_*`)
//! 2. Config file (`~/.claude-guard/config.toml`)
//! 3. Defaults

use crate::error::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,

    /// Lifecycle policy (crash detection, summary cadence).
    pub lifecycle: LifecycleConfig,

    /// Recovery narrative configuration.
    pub recovery: RecoveryConfig,

    /// Summarizer rules.
    pub summarizer: SummarizerConfig,

    /// Per-model pricing overrides, keyed by a model name fragment.
    pub pricing: HashMap<String, ModelPricing>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the claude-guard home directory.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_guard_home(),
        }
    }
}

/// Lifecycle policy constants.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Minutes without a heartbeat before an active session counts as crashed.
    pub crash_timeout_minutes: u32,

    /// Number of turns folded into each rolling summary.
    pub summary_interval: u32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            crash_timeout_minutes: 10,
            summary_interval: 5,
        }
    }
}

impl LifecycleConfig {
    /// Heartbeat staleness threshold.
    #[must_use]
    pub fn crash_timeout(&self) -> Duration {
        Duration::minutes(i64::from(self.crash_timeout_minutes))
    }

    /// Summary interval, never zero.
    #[must_use]
    pub fn interval(&self) -> u32 {
        self.summary_interval.max(1)
    }
}

/// Recovery narrative configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Maximum summary lines included in a recovery narrative.
    pub max_summaries: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self { max_summaries: 3 }
    }
}

/// Summarizer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Maximum distinct actions in one digest.
    pub max_actions: usize,

    /// Tool name patterns (glob syntax) whose file path counts as read.
    pub read_tools: Vec<String>,

    /// Tool name patterns (glob syntax) whose file path counts as modified.
    pub write_tools: Vec<String>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_actions: 5,
            read_tools: vec!["Read".to_string()],
            write_tools: vec![
                "Write".to_string(),
                "Edit".to_string(),
                "MultiEdit".to_string(),
                "NotebookEdit".to_string(),
            ],
        }
    }
}

/// Price per million tokens, in USD.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct ModelPricing {
    /// Input price per 1M tokens.
    pub input: f64,

    /// Output price per 1M tokens.
    pub output: f64,
}

/// Get the default claude-guard home directory.
fn default_guard_home() -> PathBuf {
    dirs::home_dir().map_or_else(
        || PathBuf::from(".claude-guard"),
        |h| h.join(".claude-guard"),
    )
}

/// Get the claude-guard home directory.
///
/// Uses `CLAUDE_GUARD_HOME` if set, otherwise `~/.claude-guard`.
#[must_use]
pub fn get_guard_home() -> PathBuf {
    env::var("CLAUDE_GUARD_HOME").map_or_else(|_| default_guard_home(), PathBuf::from)
}

/// Load configuration with precedence: env vars → file → defaults.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    let config_path = get_config_path();
    if config_path.exists() {
        let contents = fs::read_to_string(&config_path).map_err(Error::Storage)?;
        config = toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))?;
    }

    apply_env_overrides(&mut config);
    config.storage.path = expand_home(&config.storage.path);

    Ok(config)
}

/// Expand a leading `~` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Get the path to the config file.
fn get_config_path() -> PathBuf {
    if let Ok(path) = env::var("CLAUDE_GUARD_CONFIG") {
        return PathBuf::from(path);
    }

    get_guard_home().join("config.toml")
}

/// Apply environment variable overrides to config.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = env::var("CLAUDE_GUARD_STORAGE_PATH") {
        config.storage.path = PathBuf::from(path);
    } else if let Ok(home) = env::var("CLAUDE_GUARD_HOME") {
        config.storage.path = PathBuf::from(home);
    }

    if let Ok(val) = env::var("CLAUDE_GUARD_CRASH_TIMEOUT_MINUTES") {
        if let Ok(minutes) = val.parse() {
            config.lifecycle.crash_timeout_minutes = minutes;
        }
    }

    if let Ok(val) = env::var("CLAUDE_GUARD_SUMMARY_INTERVAL") {
        if let Ok(interval) = val.parse() {
            config.lifecycle.summary_interval = interval;
        }
    }

    if let Ok(val) = env::var("CLAUDE_GUARD_RECOVERY_SUMMARIES") {
        if let Ok(max) = val.parse() {
            config.recovery.max_summaries = max;
        }
    }
}
