//! Command implementations
//!
//! - list / search / info: inspect the collection
//! - install / dev / reload / uninstall: install pipeline
//! - enable / disable: lifecycle toggles
//! - theme: theme selection
//! - sync: remote extensions of an account

pub mod info;
pub mod install;
pub mod list;
pub mod search;
pub mod sync;
pub mod theme;
pub mod toggle;

use serde::Serialize;
use tabled::Tabled;
use xext_extensions::Extension;

/// One extension in a table or JSON listing
#[derive(Tabled, Serialize)]
pub struct ExtensionRow {
    name: String,
    #[tabled(rename = "type")]
    #[serde(rename = "type")]
    kind: String,
    version: String,
    status: String,
    source: String,
    description: String,
}

impl ExtensionRow {
    pub fn new(ext: &Extension) -> Self {
        Self {
            name: ext.name().to_string(),
            kind: ext.kind().as_str().to_string(),
            version: ext.version().unwrap_or("-").to_string(),
            status: status(ext).to_string(),
            source: source(ext).to_string(),
            description: ext.description().unwrap_or_default().to_string(),
        }
    }
}

/// Short state label of an extension
pub fn status(ext: &Extension) -> &'static str {
    if ext.is_remote() && ext.load_remote_failed() {
        "failed"
    } else if ext.is_remote() && !ext.remote_loaded() {
        "loading"
    } else if ext.need_restart() {
        "restart required"
    } else if ext.is_disabled() {
        "disabled"
    } else {
        "enabled"
    }
}

/// Where an extension comes from
pub fn source(ext: &Extension) -> &'static str {
    if ext.is_builtin() {
        "built-in"
    } else if ext.is_dev() {
        "dev"
    } else if ext.is_remote() {
        "remote"
    } else {
        "installed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use xext_core::types::{PackageManifest, RuntimeData};

    fn ext(data: RuntimeData) -> Extension {
        let pkg = PackageManifest::from_value(json!({
            "name": "notes", "type": "app", "version": "1.2.0", "webViewUrl": "https://notes"
        }))
        .unwrap();
        Extension::create(pkg, data)
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status(&ext(RuntimeData::default())), "enabled");

        let remote = ext(RuntimeData {
            is_remote: Some(true),
            ..Default::default()
        });
        assert_eq!(status(&remote), "loading");
        remote.set_load_remote_result(false, Some("offline".into()));
        assert_eq!(status(&remote), "failed");
        assert_eq!(source(&remote), "remote");

        let row = ExtensionRow::new(&ext(RuntimeData {
            is_dev: Some(true),
            ..Default::default()
        }));
        assert_eq!(row.source, "dev");
        assert_eq!(row.version, "1.2.0");
    }
}
