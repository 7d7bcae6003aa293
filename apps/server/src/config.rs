//! Runner configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use herald_core::HeraldConfig;
use serde::Deserialize;

/// Runner configuration loaded from YAML with environment overrides.
///
/// Everything except `hosts` is passed through to [`HeraldConfig`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Players to probe, as `host[:port]`.
    /// Override: `HERALD_HOSTS` (comma separated)
    pub hosts: Vec<String>,

    #[serde(flatten)]
    pub herald: HeraldConfig,
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_yaml(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("HERALD_HOSTS") {
            self.hosts = split_list(&val);
        }

        if let Ok(val) = std::env::var("HERALD_SHARE") {
            self.herald.share = val;
        }

        if let Ok(val) = std::env::var("HERALD_SHARED_FOLDER") {
            self.herald.shared_folder = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("HERALD_DEFAULT_VOLUME") {
            if let Ok(volume) = val.parse() {
                self.herald.default_volume = volume;
            }
        }

        if let Ok(val) = std::env::var("HERALD_TV_ROOM") {
            self.herald.tv_room = Some(val);
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
