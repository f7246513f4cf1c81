//! Settings file loading.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use shared::settings::{ConfigSource, TurnConfig};

/// Environment variable consulted when the settings file has no provider credential.
pub const API_KEY_ENV: &str = "ASK_API_KEY";

/// `settings.json` under the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Kb Chat", "KbChat")
        .map(|proj| proj.config_dir().join("settings.json"))
}

/// Directory for the conversation log.
pub fn default_data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Kb Chat", "KbChat")
        .map(|proj| proj.data_dir().to_path_buf())
}

/// Reads the settings file on every turn so edits apply without a restart.
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ConfigSource for FileConfig {
    fn turn_config(&self) -> Result<TurnConfig> {
        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read settings file {:?}", self.path))?;
        let mut config: TurnConfig = serde_json::from_slice(&bytes)
            .with_context(|| format!("Invalid settings file {:?}", self.path))?;

        if config.provider.credential.is_none() {
            if let Ok(key) = std::env::var(API_KEY_ENV) {
                let key = key.trim();
                if !key.is_empty() {
                    config.provider.credential = Some(key.to_string());
                }
            }
        }
        Ok(config)
    }
}
