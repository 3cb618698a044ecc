//! Extension host assembled from configuration

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::debug;
use xext_core::types::XextConfig;
use xext_core::{ConfigLoader, JsonFileStore, KeyValueStore, XextPaths};
use xext_extensions::builtin::load_builtins;
use xext_extensions::{
    Confirmation, ExtensionDatabase, ExtensionInstaller, FileSystem, LifecycleController,
    LocalFileSystem, StaticModuleLoader, ThemeManager,
};

use crate::cli::Cli;

/// Registry, built-ins and collection for one CLI invocation
pub struct Host {
    pub config: XextConfig,
    pub paths: XextPaths,
    pub store: Arc<dyn KeyValueStore>,
    pub fs: Arc<dyn FileSystem>,
    pub loader: Arc<StaticModuleLoader>,
    pub controller: Arc<LifecycleController>,
}

impl Host {
    /// Load configuration, apply CLI flags, build the collection and attach
    /// enabled extensions
    pub async fn open(cli: &Cli) -> Result<Self> {
        let mut config = ConfigLoader::new()
            .context("Failed to locate the xext config directory")?
            .load()
            .context("Failed to load configuration")?;
        if let Some(dir) = &cli.data_dir {
            config.data_dir = Some(dir.clone().into_std_path_buf());
        }
        if let Some(dir) = &cli.builtin_dir {
            config.builtin_dir = Some(dir.clone().into_std_path_buf());
        }

        let paths = XextPaths::from_config(&config);
        let store: Arc<dyn KeyValueStore> = Arc::new(
            JsonFileStore::open(paths.store_file())
                .with_context(|| format!("Failed to open {}", paths.store_file().display()))?,
        );
        let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
        let loader = Arc::new(StaticModuleLoader::new());

        let db = Arc::new(ExtensionDatabase::open(store.clone()));
        let builtins = load_builtins(&config, fs.as_ref(), store.as_ref())
            .await
            .context("Failed to load built-in extensions")?;
        let controller = LifecycleController::new(db, loader.clone());
        controller.init(builtins);
        let attached = controller.attach_all();
        debug!(
            "Opened {} with {} extensions, {} attached",
            paths.data_dir().display(),
            controller.len(),
            attached
        );

        Ok(Self {
            config,
            paths,
            store,
            fs,
            loader,
            controller,
        })
    }

    pub fn installer(&self, confirm: Arc<dyn Confirmation>) -> ExtensionInstaller {
        ExtensionInstaller::new(
            self.controller.database().clone(),
            self.fs.clone(),
            confirm,
            self.loader.clone(),
            self.paths.clone(),
        )
    }

    pub fn themes(&self) -> ThemeManager {
        ThemeManager::new(self.controller.clone(), self.store.clone())
    }
}
