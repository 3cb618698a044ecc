//! Runtime data kept alongside an extension manifest
//!
//! Runtime data is mutable and persisted independently of the manifest.
//! `remoteLoaded`, `loadRemoteFailed` and `serverData` are transient: they
//! describe the current session only and are never written to storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::manifest::PackageManifest;

/// Mutable runtime state of an extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeData {
    /// Install time in milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_time: Option<i64>,

    /// Last update time in milliseconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dev: Option<bool>,

    #[serde(rename = "remote", default, skip_serializing_if = "Option::is_none")]
    pub is_remote: Option<bool>,

    #[serde(skip)]
    pub remote_loaded: bool,

    #[serde(skip)]
    pub load_remote_failed: bool,

    #[serde(skip)]
    pub server_data: Option<Value>,

    /// Directory holding the unpacked package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    /// Where the remote archive is downloaded before unpacking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_cache_path: Option<PathBuf>,

    /// Remote download progress, 0 to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_progress: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_on_menu: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_on_menu_order: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice_count: Option<u32>,

    /// Name generated when the manifest name is invalid, kept stable across loads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_name: Option<String>,

    /// Custom data attached by the host or the extension itself
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

macro_rules! overlay_fields {
    ($target:expr, $newer:expr, $($field:ident),+ $(,)?) => {
        $(
            if $newer.$field.is_some() {
                $target.$field = $newer.$field;
            }
        )+
    };
}

impl RuntimeData {
    /// Overlay the fields set in `newer` onto `self`
    ///
    /// Fields left unset in `newer` keep their current value, so an override
    /// install keeps the previous install time and custom data.
    pub fn overlay(&mut self, newer: RuntimeData) {
        overlay_fields!(
            self,
            newer,
            install_time,
            update_time,
            disabled,
            is_dev,
            is_remote,
            server_data,
            local_path,
            remote_cache_path,
            download_progress,
            pinned_on_menu,
            pinned_on_menu_order,
            notice_count,
            fallback_name,
        );
        self.remote_loaded = newer.remote_loaded || self.remote_loaded;
        self.load_remote_failed = newer.load_remote_failed || self.load_remote_failed;
        self.extra.extend(newer.extra);
    }

    /// Copy without the transient session fields
    pub fn persistent(&self) -> RuntimeData {
        RuntimeData {
            remote_loaded: false,
            load_remote_failed: false,
            server_data: None,
            ..self.clone()
        }
    }
}

/// The plain, storable projection of an extension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    pub pkg: PackageManifest,

    #[serde(default)]
    pub data: RuntimeData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transient_fields_not_serialized() {
        let data = RuntimeData {
            remote_loaded: true,
            load_remote_failed: true,
            server_data: Some(json!({"token": "x"})),
            is_remote: Some(true),
            ..Default::default()
        };
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value, json!({"remote": true}));
    }

    #[test]
    fn test_overlay_keeps_unset_fields() {
        let mut old = RuntimeData {
            install_time: Some(10),
            disabled: Some(true),
            ..Default::default()
        };
        old.extra.insert("color".into(), json!("red"));

        let newer = RuntimeData {
            is_dev: Some(false),
            local_path: Some(PathBuf::from("/tmp/x")),
            ..Default::default()
        };
        old.overlay(newer);

        assert_eq!(old.install_time, Some(10));
        assert_eq!(old.disabled, Some(true));
        assert_eq!(old.is_dev, Some(false));
        assert_eq!(old.extra["color"], "red");
        assert_eq!(old.local_path, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_record_round_trip() {
        let record: ExtensionRecord = serde_json::from_value(json!({
            "pkg": {"name": "foo", "type": "plugin", "version": "1.0.0"},
            "data": {"installTime": 5, "disabled": true, "custom": 1}
        }))
        .unwrap();
        assert_eq!(record.data.install_time, Some(5));
        assert_eq!(record.data.extra["custom"], 1);

        let again: ExtensionRecord =
            serde_json::from_value(serde_json::to_value(&record).unwrap()).unwrap();
        assert_eq!(again, record);
    }
}
