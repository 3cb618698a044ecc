//! Test hosts wiring the extension components over a temporary directory

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use xext_core::config::XextPaths;
use xext_core::store::{JsonFileStore, KeyValueStore};
use xext_core::types::RemoteConfig;
use xext_extensions::extension::StaticModuleLoader;
use xext_extensions::{
    ExtensionDatabase, ExtensionInstaller, LifecycleController, LocalFileSystem, RemoteSyncEngine,
};

use super::builders::ManifestBuilder;
use super::mocks::*;

/// Registry, installer and controller over a temporary data directory
pub struct TestHost {
    pub temp: TempDir,
    pub paths: XextPaths,
    pub store: Arc<dyn KeyValueStore>,
    pub db: Arc<ExtensionDatabase>,
    pub loader: Arc<StaticModuleLoader>,
    pub confirm: Arc<RecordingConfirm>,
    pub installer: ExtensionInstaller,
    pub controller: Arc<LifecycleController>,
}

impl TestHost {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let paths = XextPaths::new(temp.path().join("data"), temp.path().join("tmp"));
        let store: Arc<dyn KeyValueStore> =
            Arc::new(JsonFileStore::open(paths.store_file()).unwrap());
        Self::with_store(temp, paths, store)
    }

    fn with_store(temp: TempDir, paths: XextPaths, store: Arc<dyn KeyValueStore>) -> Self {
        let db = Arc::new(ExtensionDatabase::open(store.clone()));
        let loader = Arc::new(StaticModuleLoader::new());
        let confirm = RecordingConfirm::new(true);
        let installer = ExtensionInstaller::new(
            db.clone(),
            Arc::new(LocalFileSystem::new()),
            confirm.clone(),
            loader.clone(),
            paths.clone(),
        );
        let controller = LifecycleController::new(db.clone(), loader.clone());
        controller.init(Vec::new());
        Self {
            temp,
            paths,
            store,
            db,
            loader,
            confirm,
            installer,
            controller,
        }
    }

    /// Open a fresh host over the same data directory, as after a restart
    pub fn restart(self) -> Self {
        let Self { temp, paths, .. } = self;
        let store: Arc<dyn KeyValueStore> =
            Arc::new(JsonFileStore::open(paths.store_file()).unwrap());
        Self::with_store(temp, paths, store)
    }

    /// Write a package source directory under the temp root
    pub fn source_dir(&self, manifest: &ManifestBuilder) -> PathBuf {
        manifest.write_to(&self.temp.path().join("src").join(manifest.name()))
    }

    /// Write a zipped package under the temp root
    pub fn archive(&self, manifest: &ManifestBuilder, file_name: &str) -> PathBuf {
        let path = self.temp.path().join("archives").join(file_name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, manifest.zip(None)).unwrap();
        path
    }

    /// Entries left in the staging directory
    pub fn staging_entries(&self) -> usize {
        std::fs::read_dir(self.paths.tmp_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    pub fn storage_dir(&self, name: &str) -> PathBuf {
        self.paths.extension_dir(name)
    }
}

/// Remote sync engine over mocked download and transport
pub struct RemoteHost {
    pub temp: TempDir,
    pub paths: XextPaths,
    pub downloader: Arc<MockDownloader>,
    pub transport: Arc<MockTransport>,
    pub listener: Arc<RecordingListener>,
    pub loader: Arc<StaticModuleLoader>,
    pub engine: RemoteSyncEngine,
}

impl RemoteHost {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        Self::in_dir(temp)
    }

    /// Host whose engine uses `config`
    pub fn with_config(config: &RemoteConfig) -> Self {
        Self::build(TempDir::new().unwrap(), config)
    }

    /// Host over an existing data directory, keeping its package cache
    pub fn in_dir(temp: TempDir) -> Self {
        Self::build(temp, &RemoteConfig::default())
    }

    fn build(temp: TempDir, config: &RemoteConfig) -> Self {
        let paths = XextPaths::new(temp.path().join("data"), temp.path().join("tmp"));
        let store: Arc<dyn KeyValueStore> =
            Arc::new(JsonFileStore::open(paths.store_file()).unwrap());
        let downloader = MockDownloader::new();
        let transport = MockTransport::new();
        let listener = RecordingListener::new();
        let loader = Arc::new(StaticModuleLoader::new());
        let engine = RemoteSyncEngine::new(
            paths.clone(),
            store,
            Arc::new(LocalFileSystem::new()),
            downloader.clone(),
            transport.clone(),
            loader.clone(),
            config,
        );
        engine.set_listener(listener.clone());
        Self {
            temp,
            paths,
            downloader,
            transport,
            listener,
            loader,
            engine,
        }
    }

    /// Unpacked package directory of a remote extension
    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.paths
            .user_extensions_dir(super::constants::TEST_ACCOUNT)
            .join(name)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
