//! Configuration loading and derived paths

mod loader;

pub use loader::ConfigLoader;

use crate::types::XextConfig;
use std::path::{Path, PathBuf};

/// Filesystem layout derived from a loaded configuration
#[derive(Debug, Clone)]
pub struct XextPaths {
    data_dir: PathBuf,
    tmp_dir: PathBuf,
}

impl XextPaths {
    /// Resolve paths from configuration, falling back to the system temp dir
    pub fn from_config(config: &XextConfig) -> Self {
        let tmp_dir = config.tmp_dir.clone().unwrap_or_else(std::env::temp_dir);
        let data_dir = config
            .data_dir
            .clone()
            .unwrap_or_else(|| tmp_dir.join("xext"));
        Self { data_dir, tmp_dir }
    }

    /// Create paths rooted at explicit directories
    pub fn new(data_dir: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tmp_dir: tmp_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Storage directory of a locally installed extension
    pub fn extension_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join("xexts").join(name)
    }

    /// Persistent key-value store file
    pub fn store_file(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    /// Root directory of remote extensions for one account
    pub fn user_extensions_dir(&self, account: &str) -> PathBuf {
        self.data_dir.join("users").join(account).join("extensions")
    }
}
