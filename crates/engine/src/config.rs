//! Engine configuration
//!
//! Stored as TOML in the user config directory. Missing keys fall back to
//! their defaults, so a partial file is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "codemark-anchor";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub git: GitConfig,
    pub cache: CacheConfig,
    pub backtrack: BacktrackConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Git executable name or path
    pub executable: String,
    /// Bound on every git invocation
    pub timeout_ms: u64,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            executable: "git".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl GitConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Location store directory; defaults to the user cache directory
    pub path: Option<PathBuf>,
    /// Maximum number of deltas kept in memory
    pub delta_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            delta_capacity: 256,
        }
    }
}

impl CacheConfig {
    /// Configured store path, or the default under the user cache directory
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join(APP_DIR).join("locations.db")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktrackConfig {
    /// Longest commit chain walked hop by hop; longer chains use one direct delta
    pub max_chain_len: usize,
}

impl Default for BacktrackConfig {
    fn default() -> Self {
        Self { max_chain_len: 16 }
    }
}

impl EngineConfig {
    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.git.executable.trim().is_empty() {
            anyhow::bail!("git.executable must not be empty");
        }
        if !(100..=600_000).contains(&self.git.timeout_ms) {
            anyhow::bail!("git.timeout_ms must be between 100 and 600000 (got {})", self.git.timeout_ms);
        }
        if !(1..=100_000).contains(&self.cache.delta_capacity) {
            anyhow::bail!(
                "cache.delta_capacity must be between 1 and 100000 (got {})",
                self.cache.delta_capacity
            );
        }
        if !(1..=1024).contains(&self.backtrack.max_chain_len) {
            anyhow::bail!(
                "backtrack.max_chain_len must be between 1 and 1024 (got {})",
                self.backtrack.max_chain_len
            );
        }
        Ok(())
    }

    /// Look up a value by dotted key
    pub fn get(&self, key: &str) -> Option<String> {
        let value = match key {
            "git.executable" => self.git.executable.clone(),
            "git.timeout_ms" => self.git.timeout_ms.to_string(),
            "cache.path" => self
                .cache
                .resolved_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            "cache.delta_capacity" => self.cache.delta_capacity.to_string(),
            "backtrack.max_chain_len" => self.backtrack.max_chain_len.to_string(),
            _ => return None,
        };
        Some(value)
    }

    /// All dotted keys, in display order
    pub fn keys() -> &'static [&'static str] {
        &[
            "git.executable",
            "git.timeout_ms",
            "cache.path",
            "cache.delta_capacity",
            "backtrack.max_chain_len",
        ]
    }
}

/// Directory holding the config file
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}

/// Load the user config, or defaults if there is none
pub fn load() -> Result<EngineConfig> {
    match config_file_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(EngineConfig::default()),
    }
}

pub fn load_from(path: &Path) -> Result<EngineConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: EngineConfig =
        toml::from_str(&text).with_context(|| format!("Failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

pub fn save(config: &EngineConfig) -> Result<()> {
    let path = config_file_path().context("Could not determine config file path")?;
    save_to(config, &path)
}

pub fn save_to(config: &EngineConfig, path: &Path) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write config file {}", path.display()))?;
    Ok(())
}

/// Write the default config if no config file exists yet
pub fn init_if_missing() -> Result<PathBuf> {
    let path = config_file_path().context("Could not determine config file path")?;
    if !path.exists() {
        save_to(&EngineConfig::default(), &path)?;
    }
    Ok(path)
}

/// Commented example config
pub fn example_config() -> &'static str {
    r#"# codemark-anchor configuration

[git]
# Git executable name or path
executable = "git"
# Timeout for a single git invocation, in milliseconds (100-600000)
timeout_ms = 10000

[cache]
# Location store directory (defaults to the user cache directory)
# path = "/var/cache/codemark-anchor/locations.db"
# Deltas kept in memory (1-100000)
delta_capacity = 256

[backtrack]
# Longest commit chain walked hop by hop (1-1024); longer chains are
# resolved with a single direct diff
max_chain_len = 16
"#
}
