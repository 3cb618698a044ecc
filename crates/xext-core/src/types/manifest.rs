//! Package manifest types
//!
//! A package manifest is the `package.json` shipped inside every extension
//! package. Keys nested under a top-level `xext` object take precedence over
//! the top-level keys, so a package can carry npm metadata and xext-specific
//! overrides side by side.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Name of the manifest file inside a package
pub const MANIFEST_FILE: &str = "package.json";

/// Key of the xext-specific overlay object
const XEXT_OVERLAY_KEY: &str = "xext";

fn is_false(value: &bool) -> bool {
    !*value
}

/// Package author or publisher, either a plain string or an npm person object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Person {
    Name(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        email: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl Person {
    /// Display name of the person, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name.as_str()),
            Self::Detailed { name, .. } => name.as_deref(),
        }
    }
}

/// Built-in marker carried by bundled extensions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildIn {
    /// Extension cannot be unpinned from the menu
    #[serde(default, skip_serializing_if = "is_false")]
    pub fixed: bool,

    /// Extension is the default app
    #[serde(default, skip_serializing_if = "is_false")]
    pub as_default: bool,

    /// Directory holding the bundled package files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,

    /// Name of a statically registered module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

/// One theme entry declared by a theme extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeManifest {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Stylesheet path (relative to the package) or URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,

    /// `append` or `override`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inject: Option<String>,
}

/// Typed view of an extension `package.json`
///
/// Every field is optional: validation problems are recorded on the
/// extension built from the manifest rather than rejected here. Unknown keys
/// are preserved in `extra` so that a stored manifest round-trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Declared extension type (`app`, `theme` or `plugin`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Person>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bugs: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<Value>,

    /// Entry-point file, relative to the package root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,

    /// Extension supports attaching without a restart
    #[serde(default, skip_serializing_if = "is_false")]
    pub hot: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_preload_script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_accent_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_back_color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<ThemeManifest>>,

    /// Server-side entry URL (remote extensions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,

    /// Server-side entry identifier (remote extensions)
    #[serde(rename = "entryID", default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,

    /// Archive URL (remote extensions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,

    /// Declared MD5 digest of the archive (remote extensions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_in: Option<BuildIn>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageManifest {
    /// Build a manifest from raw JSON, applying the `xext` overlay
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(apply_overlay(value))
    }

    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Serialize back to JSON
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Name of the author, if declared
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().and_then(Person::name)
    }

    /// Declares code that runs inside the host
    pub fn has_entry_point(&self) -> bool {
        self.main.is_some()
            || self
                .build_in
                .as_ref()
                .is_some_and(|build_in| build_in.module.is_some())
    }
}

/// Merge the `xext` overlay object over the top-level keys
fn apply_overlay(value: Value) -> Value {
    match value {
        Value::Object(mut map) => {
            if let Some(Value::Object(overlay)) = map.remove(XEXT_OVERLAY_KEY) {
                for (key, value) in overlay {
                    map.insert(key, value);
                }
            }
            Value::Object(map)
        }
        other => other,
    }
}

/// Overlay the keys of `top` onto `base` (shallow, later wins)
pub fn merge_values(base: Value, top: Value) -> Value {
    match (base, top) {
        (Value::Object(mut base), Value::Object(top)) => {
            for (key, value) in top {
                if !value.is_null() {
                    base.insert(key, value);
                }
            }
            Value::Object(base)
        }
        (base, Value::Null) => base,
        (_, top) => top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_xext_overlay_wins() {
        let manifest = PackageManifest::from_value(json!({
            "name": "npm-name",
            "version": "1.0.0",
            "xext": {"type": "app", "displayName": "Shown"}
        }))
        .unwrap();

        assert_eq!(manifest.kind.as_deref(), Some("app"));
        assert_eq!(manifest.display_name.as_deref(), Some("Shown"));
        assert!(!manifest.extra.contains_key("xext"));
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let manifest =
            PackageManifest::from_json(r#"{"name":"foo","customKey":{"a":1}}"#).unwrap();
        let value = manifest.to_value();
        assert_eq!(value["customKey"]["a"], 1);
        assert_eq!(value["name"], "foo");
    }

    #[test]
    fn test_author_forms() {
        let plain = PackageManifest::from_json(r#"{"author":"Ann"}"#).unwrap();
        assert_eq!(plain.author_name(), Some("Ann"));

        let detailed =
            PackageManifest::from_json(r#"{"author":{"name":"Bob","email":"b@x.io"}}"#).unwrap();
        assert_eq!(detailed.author_name(), Some("Bob"));
    }

    #[test]
    fn test_entry_point_detection() {
        let plain = PackageManifest::from_json(r#"{"name":"a"}"#).unwrap();
        assert!(!plain.has_entry_point());

        let with_main = PackageManifest::from_json(r#"{"main":"index.js"}"#).unwrap();
        assert!(with_main.has_entry_point());

        let built_in = PackageManifest::from_json(r#"{"buildIn":{"module":"home"}}"#).unwrap();
        assert!(built_in.has_entry_point());
    }

    #[test]
    fn test_merge_values_skips_nulls() {
        let merged = merge_values(json!({"icon": "a", "md5": "x"}), json!({"icon": null, "md5": "y"}));
        assert_eq!(merged, json!({"icon": "a", "md5": "y"}));
    }
}
