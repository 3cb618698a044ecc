//! Builders for test package manifests and archives

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::constants::*;

/// Builder for `package.json` contents
#[derive(Debug, Clone)]
pub struct ManifestBuilder {
    fields: Map<String, Value>,
    files: Vec<(String, String)>,
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new(TEST_EXTENSION_NAME)
    }
}

impl ManifestBuilder {
    pub fn new(name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("name".into(), json!(name));
        fields.insert("version".into(), json!(TEST_EXTENSION_VERSION));
        Self {
            fields,
            files: Vec::new(),
        }
    }

    pub fn plugin(name: &str) -> Self {
        Self::new(name).kind("plugin")
    }

    pub fn app(name: &str) -> Self {
        Self::new(name).kind("app")
    }

    pub fn theme(name: &str) -> Self {
        Self::new(name).kind("theme")
    }

    pub fn kind(self, kind: &str) -> Self {
        self.field("type", json!(kind))
    }

    pub fn version(self, version: &str) -> Self {
        self.field("version", json!(version))
    }

    pub fn display_name(self, display_name: &str) -> Self {
        self.field("displayName", json!(display_name))
    }

    /// Declare an entry point and ship it
    pub fn main(self, main: &str) -> Self {
        self.field("main", json!(main))
            .file(main, "module.exports = {};")
    }

    pub fn hot(self) -> Self {
        self.field("hot", json!(true))
    }

    pub fn web_view(self, url: &str) -> Self {
        self.field("webViewUrl", json!(url))
    }

    pub fn themes(self, themes: Value) -> Self {
        self.field("themes", themes)
    }

    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    /// Ship an extra file in the package
    pub fn file(mut self, path: &str, contents: &str) -> Self {
        self.files.push((path.to_string(), contents.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        self.fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn build(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Write the package into `dir`
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(
            dir.join("package.json"),
            serde_json::to_string_pretty(&self.build()).unwrap(),
        )
        .unwrap();
        for (path, contents) in &self.files {
            let file = dir.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(file, contents).unwrap();
        }
        dir.to_path_buf()
    }

    /// Zip the package, optionally under a top-level folder
    pub fn zip(&self, folder: Option<&str>) -> Vec<u8> {
        let prefix = folder.map(|f| format!("{}/", f)).unwrap_or_default();
        let mut files = vec![(
            "package.json".to_string(),
            serde_json::to_string_pretty(&self.build()).unwrap(),
        )];
        files.extend(self.files.iter().cloned());

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (path, contents) in files {
            writer
                .start_file(format!("{}{}", prefix, path), options)
                .unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }
}

/// Hex MD5 of a byte slice
pub fn md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    format!("{:x}", Md5::digest(bytes))
}

/// Server list item for a downloadable package
pub fn server_item(name: &str, package: &[u8]) -> Value {
    json!({
        "name": name,
        "download": format!("{}/{}.zip", TEST_DOWNLOAD_BASE, name),
        "md5": md5_hex(package),
        "logo": format!("{}/{}.png", TEST_DOWNLOAD_BASE, name),
        "entryID": format!("entry-{}", name),
        "data": {"owner": TEST_ACCOUNT}
    })
}

/// Download URL used by [`server_item`]
pub fn download_url(name: &str) -> String {
    format!("{}/{}.zip", TEST_DOWNLOAD_BASE, name)
}
