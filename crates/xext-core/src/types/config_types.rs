//! Configuration types for the extension host

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete xext configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct XextConfig {
    /// Root of all persisted extension data (defaults to ~/.xext)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Scratch directory for archive extraction (defaults to the system temp dir)
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,

    /// Directory of bundled extension packages
    #[serde(default)]
    pub builtin_dir: Option<PathBuf>,

    /// Publisher assigned to built-in extensions that do not declare one
    #[serde(default = "default_builtin_publisher")]
    pub builtin_publisher: String,

    /// Author assigned to built-in extensions that do not declare one
    #[serde(default = "default_builtin_author")]
    pub builtin_author: String,

    /// Remote extension settings
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,
}

impl Default for XextConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            tmp_dir: None,
            builtin_dir: None,
            builtin_publisher: default_builtin_publisher(),
            builtin_author: default_builtin_author(),
            remote: RemoteConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

/// Remote extension settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RemoteConfig {
    /// Interval between full re-fetches of the server extension list
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: default_fetch_interval(),
        }
    }
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Download timeout in seconds
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            download_timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_builtin_publisher() -> String {
    "xext".to_string()
}

fn default_builtin_author() -> String {
    "xext".to_string()
}

fn default_fetch_interval() -> u64 {
    90 * 60
}

fn default_http_timeout() -> u64 {
    30
}

fn default_download_timeout() -> u64 {
    300
}

fn default_user_agent() -> String {
    format!("xext/{}", env!("CARGO_PKG_VERSION"))
}
