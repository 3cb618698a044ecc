//! Extensions bundled with the host

use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use xext_core::store::KeyValueStore;
use xext_core::types::{PackageManifest, Person, RuntimeData, XextConfig, MANIFEST_FILE};
use xext_core::Result;

use crate::extension::{Extension, SharedExtension};
use crate::fs::FileSystem;
use crate::registry::restore_extension_data;

/// Built-in apps: name, display name, icon, accent color, default app
const BUILTIN_APPS: &[(&str, &str, &str, &str, bool)] = &[
    ("home", "Home", "mdi-apps", "#3f51b5", true),
    ("extensions", "Extensions", "mdi-puzzle", "#00c853", false),
    ("themes", "Themes", "mdi-airballoon", "#f50057", false),
    ("files", "Files", "mdi-folder", "#ff9100", false),
];

/// Manifests of the built-in apps
pub fn builtin_app_manifests() -> Vec<PackageManifest> {
    BUILTIN_APPS
        .iter()
        .filter_map(|(name, display_name, icon, color, as_default)| {
            let pkg = json!({
                "name": name,
                "displayName": display_name,
                "type": "app",
                "appType": "insideView",
                "version": env!("CARGO_PKG_VERSION"),
                "icon": icon,
                "accentColor": color,
                "buildIn": {
                    "fixed": as_default,
                    "asDefault": as_default,
                    "module": name,
                },
            });
            PackageManifest::from_value(pkg)
                .map_err(|e| warn!("Invalid built-in app {}: {}", name, e))
                .ok()
        })
        .collect()
}

/// Packages under `dir` whose manifest name matches their directory
pub async fn scan_builtin_dir(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PackageManifest>> {
    if !fs.exists(dir).await {
        debug!("No built-in directory at {:?}", dir);
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();

    let mut manifests = Vec::new();
    for package_dir in dirs {
        let dir_name = package_dir
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let value = match fs.read_json(&package_dir.join(MANIFEST_FILE)).await {
            Ok(value) => value,
            Err(e) => {
                debug!("Skipping {:?}: {}", package_dir, e);
                continue;
            }
        };
        let mut pkg = match PackageManifest::from_value(value) {
            Ok(pkg) => pkg,
            Err(e) => {
                warn!("Skipping built-in package {:?}: {}", package_dir, e);
                continue;
            }
        };
        if pkg.name.as_deref() != Some(dir_name.as_str()) {
            warn!(
                "Skipping built-in package {:?}: name does not match its directory",
                package_dir
            );
            continue;
        }
        pkg.build_in.get_or_insert_with(Default::default).local_path = Some(package_dir);
        manifests.push(pkg);
    }
    Ok(manifests)
}

/// Build the built-in extensions in bundle order
///
/// Publisher and author default to the configured values. Install time and
/// menu order follow the bundle order, and runtime data saved by earlier
/// sessions is restored.
pub fn build_builtins(
    manifests: Vec<PackageManifest>,
    config: &XextConfig,
    store: &dyn KeyValueStore,
) -> Vec<SharedExtension> {
    manifests
        .into_iter()
        .enumerate()
        .map(|(index, mut pkg)| {
            if pkg.publisher.is_none() {
                pkg.publisher = Some(config.builtin_publisher.clone());
            }
            if pkg.author.is_none() {
                pkg.author = Some(Person::Name(config.builtin_author.clone()));
            }
            let data = RuntimeData {
                install_time: Some(index as i64),
                pinned_on_menu_order: Some(index as i64),
                ..Default::default()
            };
            let ext = Extension::create_builtin(pkg, data);
            restore_extension_data(store, &ext);
            Arc::new(ext)
        })
        .collect()
}

/// Built-in apps followed by the packages of the configured built-in directory
pub async fn load_builtins(
    config: &XextConfig,
    fs: &dyn FileSystem,
    store: &dyn KeyValueStore,
) -> Result<Vec<SharedExtension>> {
    let mut manifests = builtin_app_manifests();
    if let Some(dir) = &config.builtin_dir {
        manifests.extend(scan_builtin_dir(fs, dir).await?);
    }
    Ok(build_builtins(manifests, config, store))
}
