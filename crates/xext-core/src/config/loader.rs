//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from multiple sources with the following precedence (low to high):
//! 1. Embedded defaults (built into binary)
//! 2. User config (~/.xext/config.yaml)
//! 3. Environment variables (XEXT_* prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, Result};
use crate::types::XextConfig;
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const DEFAULTS_FILE: &str = "xext-defaults.yaml";
const USER_CONFIG_FILE: &str = "config.yaml";

/// Configuration hierarchy loader
pub struct ConfigLoader {
    /// Base directory for configuration files
    config_dir: Utf8PathBuf,
}

impl ConfigLoader {
    /// Create a loader rooted at the standard config directory (~/.xext)
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;
        Ok(Self { config_dir })
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self { config_dir }
    }

    fn get_config_dir() -> Result<Utf8PathBuf> {
        let home = crate::utils::get_home_dir()?;
        let home = Utf8PathBuf::from_path_buf(home)
            .map_err(|_| Error::invalid_config("Home directory is not valid UTF-8"))?;
        Ok(home.join(".xext"))
    }

    /// Load configuration with hierarchical precedence
    pub fn load(&self) -> Result<XextConfig> {
        let mut config = Self::load_embedded_config::<XextConfig>(DEFAULTS_FILE)?;

        let user_config_path = self.config_dir.join(USER_CONFIG_FILE);
        if user_config_path.exists() {
            debug!("Loading user config from {}", user_config_path);
            config = self.load_yaml_file::<XextConfig>(&user_config_path)?;
        }

        if config.data_dir.is_none() {
            config.data_dir = Some(self.config_dir.clone().into_std_path_buf());
        }

        self.apply_env_overrides(config)
    }

    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::config_not_found(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    fn load_yaml_file<T: DeserializeOwned>(&self, path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    fn apply_env_overrides(&self, mut config: XextConfig) -> Result<XextConfig> {
        if let Ok(val) = env::var("XEXT_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("XEXT_TMP_DIR") {
            config.tmp_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("XEXT_BUILTIN_DIR") {
            config.builtin_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = env::var("XEXT_FETCH_INTERVAL_SECS") {
            config.remote.fetch_interval_secs = val.parse().map_err(|_| {
                Error::invalid_config("XEXT_FETCH_INTERVAL_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("XEXT_HTTP_TIMEOUT_SECS") {
            config.network.http_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("XEXT_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("XEXT_DOWNLOAD_TIMEOUT_SECS") {
            config.network.download_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("XEXT_DOWNLOAD_TIMEOUT_SECS must be a valid number")
            })?;
        }

        Ok(config)
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
