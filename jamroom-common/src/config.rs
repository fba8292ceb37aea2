//! Configuration loading and config file resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "JAMROOM_CONFIG";

/// Raw contents of a `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub prefix: Option<String>,
    pub history_limit: Option<usize>,
    pub idle_grace_secs: Option<u64>,
    pub engine_timeout_ms: Option<u64>,
    pub autoplay_retries: Option<u32>,
    pub default_search_source: Option<String>,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// Parse a config file from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Fully resolved bot settings
#[derive(Debug, Clone, PartialEq)]
pub struct BotSettings {
    /// Prefix for text commands (`!play ...`)
    pub prefix: String,
    /// Maximum entries kept in each session's play history
    pub history_limit: usize,
    /// How long an idle session survives before eviction
    pub idle_grace: Duration,
    /// Upper bound on any single audio engine call
    pub engine_timeout: Duration,
    /// Extra autoplay searches (with the original seed) before giving up
    pub autoplay_retries: u32,
    /// Search source used for plain-text queries
    pub default_search_source: String,
    pub log_level: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            history_limit: 25,
            idle_grace: Duration::from_secs(180),
            engine_timeout: Duration::from_millis(10_000),
            autoplay_retries: 1,
            default_search_source: "youtube".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl BotSettings {
    /// Overlay the keys present in `toml` onto compiled defaults
    pub fn from_toml(toml: TomlConfig) -> Result<Self> {
        let defaults = Self::default();

        let prefix = toml.prefix.unwrap_or(defaults.prefix);
        if prefix.trim().is_empty() {
            return Err(Error::Config("prefix must not be empty".to_string()));
        }

        let history_limit = toml.history_limit.unwrap_or(defaults.history_limit);
        if history_limit == 0 {
            return Err(Error::Config("history_limit must be at least 1".to_string()));
        }

        Ok(Self {
            prefix,
            history_limit,
            idle_grace: toml
                .idle_grace_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_grace),
            engine_timeout: toml
                .engine_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.engine_timeout),
            autoplay_retries: toml.autoplay_retries.unwrap_or(defaults.autoplay_retries),
            default_search_source: toml
                .default_search_source
                .unwrap_or(defaults.default_search_source),
            log_level: toml.log_level.unwrap_or(defaults.log_level),
        })
    }

    /// Resolve and load settings.
    ///
    /// Config file priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. `JAMROOM_CONFIG` environment variable
    /// 3. Platform config file (`~/.config/jamroom/config.toml`, `/etc/jamroom/config.toml`)
    /// 4. Compiled defaults (fallback)
    ///
    /// An explicitly named file that cannot be read is an error; a missing
    /// platform file is not.
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_path {
            debug!("Loading config from command line path {}", path.display());
            return Self::from_toml(TomlConfig::load(path)?);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            debug!("Loading config from {}={}", CONFIG_ENV_VAR, path);
            return Self::from_toml(TomlConfig::load(Path::new(&path))?);
        }

        match find_config_file() {
            Some(path) => match TomlConfig::load(&path) {
                Ok(toml) => Self::from_toml(toml),
                Err(e) => {
                    warn!("Ignoring unreadable config {}: {}", path.display(), e);
                    Ok(Self::default())
                }
            },
            None => {
                debug!("No config file found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Locate the platform config file, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("jamroom").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/jamroom/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}
