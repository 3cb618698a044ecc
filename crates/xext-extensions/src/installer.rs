//! Install pipeline
//!
//! Turns a package archive or directory into a persisted, optionally
//! hot-attached extension. Each attempt moves through [`InstallStage`]s:
//!
//! ```text
//! Extracted -> Validated -> Confirmed -> VersionResolved -> Copied -> Persisted -> Attached | Skipped
//! ```
//!
//! Archives are unpacked into a scratch directory that is removed when the
//! attempt ends, whatever the outcome. Installs of the same extension name
//! are serialized.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use xext_core::types::{PackageManifest, RuntimeData, MANIFEST_FILE};
use xext_core::utils::is_newer_version;
use xext_core::{Error, Result, XextPaths};

use crate::archive;
use crate::confirm::{Confirmation, Prompt};
use crate::extension::{Extension, ModuleLoader, SharedExtension};
use crate::fs::FileSystem;
use crate::registry::ExtensionDatabase;

/// Readme file shown on the extension detail page
pub const README_FILE: &str = "README.md";

/// Where a package is installed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// A `.xext`, `.zip` or tarball package
    Archive(PathBuf),
    /// An unpacked package directory containing `package.json`
    Directory(PathBuf),
}

impl InstallSource {
    /// Classify a path chosen by the user
    ///
    /// Accepts a package archive, a package directory, or the
    /// `package.json` file inside one.
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() && path.join(MANIFEST_FILE).is_file() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        if path.file_name().is_some_and(|name| name == MANIFEST_FILE) && path.is_file() {
            let dir = path.parent().unwrap_or(Path::new("."));
            return Ok(Self::Directory(dir.to_path_buf()));
        }
        if archive::is_package_file(path) {
            return Ok(Self::Archive(path.to_path_buf()));
        }
        Err(Error::not_extension_source(path.display().to_string()))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(path) | Self::Directory(path) => path,
        }
    }
}

/// Install pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Extracted,
    Validated,
    Confirmed,
    VersionResolved,
    Copied,
    Persisted,
    Attached,
    Skipped,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Extracted => "extracted",
            Self::Validated => "validated",
            Self::Confirmed => "confirmed",
            Self::VersionResolved => "version-resolved",
            Self::Copied => "copied",
            Self::Persisted => "persisted",
            Self::Attached => "attached",
            Self::Skipped => "skipped",
        })
    }
}

/// Result of a successful install
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub extension: SharedExtension,
    /// An installed extension of the same name was replaced
    pub replaced: bool,
    /// Final stage, `Attached` or `Skipped`
    pub stage: InstallStage,
}

impl InstallOutcome {
    /// The extension only becomes usable after a restart
    pub fn need_restart(&self) -> bool {
        self.extension.need_restart()
    }
}

/// Installs, reloads and uninstalls local extensions
pub struct ExtensionInstaller {
    db: Arc<ExtensionDatabase>,
    fs: Arc<dyn FileSystem>,
    confirm: Arc<dyn Confirmation>,
    loader: Arc<dyn ModuleLoader>,
    paths: XextPaths,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExtensionInstaller {
    pub fn new(
        db: Arc<ExtensionDatabase>,
        fs: Arc<dyn FileSystem>,
        confirm: Arc<dyn Confirmation>,
        loader: Arc<dyn ModuleLoader>,
        paths: XextPaths,
    ) -> Self {
        Self {
            db,
            fs,
            confirm,
            loader,
            paths,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn database(&self) -> &Arc<ExtensionDatabase> {
        &self.db
    }

    /// Permanent storage directory of an extension
    pub fn storage_dir(&self, ext: &Extension) -> PathBuf {
        ext.local_path()
            .unwrap_or_else(|| self.paths.extension_dir(ext.name()))
    }

    /// Install from any supported source
    pub async fn install(&self, source: &InstallSource) -> Result<InstallOutcome> {
        match source {
            InstallSource::Archive(path) => self.install_archive(path).await,
            InstallSource::Directory(path) => self.install_dir(path).await,
        }
    }

    /// Install a package archive
    pub async fn install_archive(&self, archive_path: &Path) -> Result<InstallOutcome> {
        let staging = self.staging_dir().await?;
        self.fs.extract_archive(archive_path, staging.path()).await?;
        debug!(
            "Install stage {}: {:?} into {:?}",
            InstallStage::Extracted,
            archive_path,
            staging.path()
        );

        let root = archive::package_root(staging.path());
        self.install_from(&root, false).await
    }

    /// Install by copying an unpacked package directory
    pub async fn install_dir(&self, dir: &Path) -> Result<InstallOutcome> {
        self.install_from(dir, false).await
    }

    /// Install a package in place from a development directory
    pub async fn install_dev(&self, dir: &Path) -> Result<InstallOutcome> {
        self.install_from(dir, true).await
    }

    async fn staging_dir(&self) -> Result<TempDir> {
        tokio::fs::create_dir_all(self.paths.tmp_dir()).await?;
        Ok(tempfile::Builder::new()
            .prefix("xext-install-")
            .tempdir_in(self.paths.tmp_dir())?)
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(name.to_string()).or_default().clone()
    }

    async fn read_manifest(&self, dir: &Path) -> Result<PackageManifest> {
        let path = dir.join(MANIFEST_FILE);
        let display = path.display().to_string();
        let value = self
            .fs
            .read_json(&path)
            .await
            .map_err(|e| Error::invalid_manifest(&display, e))?;
        if !value.is_object() {
            return Err(Error::invalid_manifest(display, "manifest must be a JSON object"));
        }
        PackageManifest::from_value(value).map_err(|e| Error::invalid_manifest(display, e))
    }

    async fn ask(&self, ext: &Extension, prompt: Prompt) -> Result<()> {
        if self.confirm.confirm(&prompt).await {
            Ok(())
        } else {
            info!("Install of {} declined", ext.name());
            Err(Error::canceled(ext.name()))
        }
    }

    async fn install_from(&self, dir: &Path, dev: bool) -> Result<InstallOutcome> {
        let pkg = self.read_manifest(dir).await?;
        let ext = Arc::new(Extension::create(
            pkg,
            RuntimeData {
                is_dev: Some(dev),
                ..Default::default()
            },
        ));
        let storage = if dev {
            dir.to_path_buf()
        } else {
            self.paths.extension_dir(ext.name())
        };
        ext.set_local_path(&storage);
        debug!(
            "Install stage {}: {} {} ({} issues)",
            InstallStage::Validated,
            ext.name(),
            ext.version().unwrap_or("?"),
            ext.issues().len()
        );

        let lock = self.lock_for(ext.name());
        let _guard = lock.lock().await;

        if ext.has_module() {
            self.ask(
                &ext,
                Prompt::InstallCode {
                    display_name: ext.display_name().to_string(),
                },
            )
            .await?;
            debug!("Install stage {}: {}", InstallStage::Confirmed, ext.name());
        }

        let existing = self.db.get(ext.name());
        let override_existing = match &existing {
            None => false,
            Some(installed) => {
                let prompt = match (installed.version(), ext.version()) {
                    (Some(current), Some(candidate)) if is_newer_version(current, candidate) => {
                        Prompt::UpdateInstall {
                            display_name: installed.display_name().to_string(),
                            installed_version: current.to_string(),
                            version: candidate.to_string(),
                        }
                    }
                    _ => Prompt::OverrideInstall {
                        installed_name: installed.display_name().to_string(),
                        installed_version: installed.version().unwrap_or("*").to_string(),
                        display_name: ext.display_name().to_string(),
                        version: ext.version().unwrap_or("*").to_string(),
                    },
                };
                self.ask(&ext, prompt).await?;
                true
            }
        };
        debug!(
            "Install stage {}: {} (override: {})",
            InstallStage::VersionResolved,
            ext.name(),
            override_existing
        );

        if !dev {
            self.fs.empty_dir(&storage).await?;
            self.fs.copy_dir(dir, &storage).await?;
            debug!("Install stage {}: {:?}", InstallStage::Copied, storage);
        }

        if let Some(installed) = &existing {
            installed.detach();
        }

        let loader = self.loader.clone();
        let saved = self.db.upsert_with(ext, override_existing, |ext| {
            ext.hot_attach(loader.as_ref());
        })?;
        debug!("Install stage {}: {}", InstallStage::Persisted, saved.name());

        let stage = if saved.is_module_loaded() {
            InstallStage::Attached
        } else {
            InstallStage::Skipped
        };
        if saved.need_restart() {
            info!("Extension {} will be loaded after a restart", saved.name());
        }
        info!(
            "Installed extension {} {} ({})",
            saved.name(),
            saved.version().unwrap_or("?"),
            stage
        );

        Ok(InstallOutcome {
            extension: saved,
            replaced: existing.is_some(),
            stage,
        })
    }

    /// Re-read a development extension's manifest and re-attach it
    ///
    /// The install time is kept; only the update time advances.
    pub async fn reload_dev(&self, name: &str) -> Result<SharedExtension> {
        let current = self.db.get(name).ok_or_else(|| Error::not_found(name))?;
        let dir = current
            .local_path()
            .ok_or_else(|| Error::invalid_manifest(name, "extension has no local path"))?;
        if !current.is_dev() {
            warn!("Reloading {} which was not installed in development mode", name);
        }

        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        if current.is_module_loaded() {
            current.detach();
        }

        let pkg = self.read_manifest(&dir).await?;
        let reloaded = Arc::new(Extension::create(pkg, current.data()));
        let loader = self.loader.clone();
        let saved = self.db.upsert_with(reloaded, true, |ext| {
            ext.attach_ready(loader.as_ref());
        })?;

        info!("Reloaded extension {}", saved.name());
        Ok(saved)
    }

    /// Remove an installed extension and, unless it is a development
    /// install, its storage directory
    pub async fn uninstall(&self, name: &str) -> Result<SharedExtension> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let ext = self.db.remove(name)?;
        ext.detach();
        if !ext.is_dev() {
            let storage = self.storage_dir(&ext);
            self.fs.remove(&storage).await?;
            debug!("Removed {:?}", storage);
        }

        info!("Uninstalled extension {}", name);
        Ok(ext)
    }

    /// Read the extension's README
    pub async fn load_readme(&self, ext: &Extension) -> Result<String> {
        self.fs
            .read_to_string(&self.storage_dir(ext).join(README_FILE))
            .await
    }
}
