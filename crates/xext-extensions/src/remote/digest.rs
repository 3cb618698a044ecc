//! Digest sidecar written next to an unpacked remote package

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use xext_core::Result;

use crate::fs::FileSystem;

/// Sidecar file name inside the package directory
pub const DIGEST_FILE: &str = "digest.json";

/// What was unpacked into a remote package directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestRecord {
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    pub downloaded_at: DateTime<Utc>,
}

impl DigestRecord {
    pub fn new(digest: Option<&str>, download_url: Option<&str>) -> Self {
        Self {
            digest: digest.map(str::to_string),
            download_url: download_url.map(str::to_string),
            downloaded_at: Utc::now(),
        }
    }

    /// Read the sidecar of `dir`; missing or malformed files read as `None`
    pub async fn read(fs: &dyn FileSystem, dir: &Path) -> Option<Self> {
        let value = fs.read_json(&dir.join(DIGEST_FILE)).await.ok()?;
        match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Ignoring malformed digest sidecar in {:?}: {}", dir, e);
                None
            }
        }
    }

    pub async fn write(&self, fs: &dyn FileSystem, dir: &Path) -> Result<()> {
        fs.write_json(&dir.join(DIGEST_FILE), &serde_json::to_value(self)?)
            .await
    }

    /// The unpacked contents are those of the declared package
    ///
    /// Without a declared digest, the download URL must match instead.
    pub fn matches(&self, digest: Option<&str>, download_url: Option<&str>) -> bool {
        match digest {
            Some(digest) => self
                .digest
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(digest)),
            None => self.digest.is_none() && self.download_url.as_deref() == download_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let record = DigestRecord::new(Some("ABC"), Some("https://x/p.zip"));
        assert!(record.matches(Some("abc"), None));
        assert!(!record.matches(Some("abd"), Some("https://x/p.zip")));
        assert!(!record.matches(None, Some("https://x/p.zip")));

        let record = DigestRecord::new(None, Some("https://x/p.zip"));
        assert!(record.matches(None, Some("https://x/p.zip")));
        assert!(!record.matches(None, Some("https://x/q.zip")));
    }
}
