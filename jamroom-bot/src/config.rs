//! jamroom-bot specific configuration
//!
//! Layers command-line and environment overrides on top of the settings
//! resolved from TOML by `jamroom_common::config`.

use crate::error::{Error, Result};
use jamroom_common::config::BotSettings;
use std::path::PathBuf;
use tracing::debug;

/// Overrides taken from the command line (or their environment variables)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub prefix: Option<String>,
    pub log_level: Option<String>,
}

impl Overrides {
    /// Resolve the settings file, then apply the overrides
    pub fn load(&self) -> Result<BotSettings> {
        let settings = BotSettings::resolve(self.config_path.as_deref())?;
        self.apply(settings)
    }

    pub fn apply(&self, mut settings: BotSettings) -> Result<BotSettings> {
        if let Some(prefix) = &self.prefix {
            if prefix.trim().is_empty() {
                return Err(Error::Config("prefix must not be empty".to_string()));
            }
            debug!("Prefix overridden to {:?}", prefix);
            settings.prefix = prefix.clone();
        }
        if let Some(level) = &self.log_level {
            settings.log_level = level.clone();
        }
        Ok(settings)
    }
}
