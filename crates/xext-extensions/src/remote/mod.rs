//! Remote extension sync
//!
//! While a user session is active the server publishes a list of extensions
//! for the account. Each one becomes a placeholder extension right away and
//! is then resolved in the background: the package archive is downloaded,
//! checked against its declared MD5 digest, unpacked under the account's
//! extension directory and swapped in as a fully loaded extension. Resolved
//! packages are cached on disk and re-used while the digest stays the same.
//!
//! The list is re-fetched periodically until the session ends.

mod digest;
mod entry;

pub use digest::{DigestRecord, DIGEST_FILE};
pub use entry::EntryVisitQueue;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use xext_core::config::XextPaths;
use xext_core::store::KeyValueStore;
use xext_core::types::{merge_values, PackageManifest, RemoteConfig, RuntimeData, MANIFEST_FILE};
use xext_core::{Error, Result};

use crate::events::{ChangeAction, ChangeListener};
use crate::extension::{Extension, ModuleLoader, SharedExtension};
use crate::fs::FileSystem;
use crate::net::{verify_md5, Downloader};
use crate::registry::restore_extension_data;
use crate::transport::{Request, Transport};

/// One item of the server's extension list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerExtension {
    pub name: String,

    /// Package archive URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    /// Icon shown before the package is resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_url: Option<String>,

    #[serde(rename = "entryID", default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,

    /// Opaque per-user data attached by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Any other manifest keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerExtension {
    /// Served as a web page only; there is nothing to download
    pub fn is_web_view_only(&self) -> bool {
        self.download.is_none() && self.web_view_url.is_some()
    }

    /// Manifest of the placeholder extension
    fn manifest(&self) -> serde_json::Result<PackageManifest> {
        let mut pkg = self.extra.clone();
        pkg.insert("name".into(), json!(self.name));
        for (key, value) in [
            ("download", &self.download),
            ("md5", &self.md5),
            ("icon", &self.logo),
            ("webViewUrl", &self.web_view_url),
            ("entryID", &self.entry_id),
        ] {
            if let Some(value) = value {
                pkg.insert(key.into(), json!(value));
            }
        }
        if let Some(entry_url) = self.entry_url.as_ref().or(self.web_view_url.as_ref()) {
            pkg.insert("entryUrl".into(), json!(entry_url));
        }
        if self.is_web_view_only() {
            pkg.insert("type".into(), json!("app"));
            pkg.insert("appType".into(), json!("webView"));
        }
        PackageManifest::from_value(Value::Object(pkg))
    }
}

/// Session parameters for [`RemoteSyncEngine::start_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSession {
    pub account: String,
    /// The server publishes an extension list for this account
    pub remote_extensions: bool,
}

impl RemoteSession {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            remote_extensions: true,
        }
    }
}

struct SessionState {
    account: String,
    queue: Vec<SharedExtension>,
    cancel: CancellationToken,
    entries: EntryVisitQueue,
}

struct SyncInner {
    paths: XextPaths,
    store: Arc<dyn KeyValueStore>,
    fs: Arc<dyn FileSystem>,
    downloader: Arc<dyn Downloader>,
    transport: Arc<dyn Transport>,
    loader: Arc<dyn ModuleLoader>,
    fetch_interval: Duration,
    listener: RwLock<Option<Arc<dyn ChangeListener>>>,
    session: Mutex<Option<SessionState>>,
    processing: AtomicBool,
    idle: Notify,
}

/// Keeps the remote extensions of the signed-in account in sync
pub struct RemoteSyncEngine {
    inner: Arc<SyncInner>,
}

impl RemoteSyncEngine {
    pub fn new(
        paths: XextPaths,
        store: Arc<dyn KeyValueStore>,
        fs: Arc<dyn FileSystem>,
        downloader: Arc<dyn Downloader>,
        transport: Arc<dyn Transport>,
        loader: Arc<dyn ModuleLoader>,
        config: &RemoteConfig,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                paths,
                store,
                fs,
                downloader,
                transport,
                loader,
                fetch_interval: Duration::from_secs(config.fetch_interval_secs.max(1)),
                listener: RwLock::new(None),
                session: Mutex::new(None),
                processing: AtomicBool::new(false),
                idle: Notify::new(),
            }),
        }
    }

    /// Receive add, update and remove notifications for remote extensions
    pub fn set_listener(&self, listener: Arc<dyn ChangeListener>) {
        *self.inner.listener.write() = Some(listener);
    }

    /// Begin syncing for an account, ending any previous session first
    ///
    /// The session stays open when the first fetch fails; the refresh timer
    /// retries later.
    pub async fn start_session(&self, session: RemoteSession) -> Result<()> {
        self.end_session();
        if !session.remote_extensions {
            debug!("Account {} has no remote extensions", session.account);
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let entries =
            EntryVisitQueue::spawn(self.inner.transport.clone(), cancel.child_token());
        info!("Starting remote session for {}", session.account);
        *self.inner.session.lock() = Some(SessionState {
            account: session.account,
            queue: Vec::new(),
            cancel: cancel.clone(),
            entries,
        });

        self.inner.spawn_refresh_timer(cancel);
        self.inner.fetch().await
    }

    /// Stop syncing and unload every remote extension
    pub fn end_session(&self) {
        self.inner.end_session();
    }

    /// Detach everything and fetch the server list again
    pub async fn refresh(&self) -> Result<()> {
        self.inner.refresh().await
    }

    /// Replace or add placeholders for a server list and start resolving them
    pub fn handle_server_extensions(&self, items: Vec<ServerExtension>) -> Result<()> {
        self.inner.handle_server_extensions(items)
    }

    /// Resolve pending extensions until none is left
    ///
    /// Returns at once when another drain is already running.
    pub async fn drain(&self) {
        self.inner.drain().await;
    }

    /// Wait until no extension is pending and no drain is running
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if !self.inner.processing.load(Ordering::SeqCst) && self.inner.next_pending().is_none()
            {
                return;
            }
            notified.await;
        }
    }

    pub fn account(&self) -> Option<String> {
        self.inner.session.lock().as_ref().map(|s| s.account.clone())
    }

    pub fn is_active(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Remote extensions of the current session in server order
    pub fn extensions(&self) -> Vec<SharedExtension> {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.queue.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<SharedExtension> {
        self.extensions().into_iter().find(|ext| ext.name() == name)
    }

    /// Single-sign-on URL for a server entry
    pub async fn entry_visit_url(&self, entry_id: &str, referer: &str) -> Result<String> {
        let entries = self
            .inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.entries.clone())
            .ok_or(Error::SessionClosed)?;
        entries.visit_url(entry_id, referer).await
    }

    /// URL to open an extension at
    ///
    /// Extensions with a server entry go through the visit queue. Others use
    /// their declared entry URL, or the web view URL for apps.
    pub async fn entry_url(&self, ext: &Extension, referer: Option<&str>) -> Result<Option<String>> {
        if ext.has_server_entry() {
            let url = self
                .entry_visit_url(ext.entry_id(), referer.unwrap_or_default())
                .await?;
            return Ok(Some(url));
        }
        if let Some(url) = ext.entry_url() {
            return Ok(Some(url.to_string()));
        }
        Ok(ext.as_app().and_then(|app| app.web_view_url()))
    }
}

impl Drop for RemoteSyncEngine {
    fn drop(&mut self) {
        if let Some(session) = self.inner.session.lock().as_ref() {
            session.cancel.cancel();
        }
    }
}

impl SyncInner {
    fn notify(&self, extensions: &[SharedExtension], action: ChangeAction) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_change(extensions, action);
        }
    }

    fn is_queued(&self, ext: &SharedExtension) -> bool {
        self.session
            .lock()
            .as_ref()
            .is_some_and(|s| s.queue.iter().any(|queued| Arc::ptr_eq(queued, ext)))
    }

    /// First extension neither loaded nor failed, with its session token
    fn next_pending(&self) -> Option<(SharedExtension, CancellationToken)> {
        let session = self.session.lock();
        let session = session.as_ref()?;
        session
            .queue
            .iter()
            .find(|ext| !ext.remote_loaded() && !ext.load_remote_failed())
            .map(|ext| (ext.clone(), session.cancel.clone()))
    }

    fn end_session(&self) {
        let Some(session) = self.session.lock().take() else {
            return;
        };
        session.cancel.cancel();
        for ext in &session.queue {
            ext.detach();
        }
        if !session.queue.is_empty() {
            self.notify(&session.queue, ChangeAction::Remove);
        }
        info!("Ended remote session for {}", session.account);
    }

    fn spawn_refresh_timer(self: &Arc<Self>, cancel: CancellationToken) {
        let inner = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(inner.fetch_interval) => {
                        if let Err(e) = inner.refresh().await {
                            warn!("Failed to refresh remote extensions: {}", e);
                        }
                    }
                }
            }
            debug!("Remote refresh timer stopped");
        });
    }

    async fn refresh(self: &Arc<Self>) -> Result<()> {
        let removed = {
            let mut session = self.session.lock();
            let session = session.as_mut().ok_or(Error::SessionClosed)?;
            std::mem::take(&mut session.queue)
        };
        for ext in &removed {
            ext.detach();
        }
        if !removed.is_empty() {
            self.notify(&removed, ChangeAction::Remove);
        }
        self.fetch().await
    }

    async fn fetch(self: &Arc<Self>) -> Result<()> {
        let response = self
            .transport
            .send(Request::new("chat", "extensions", Value::Null))
            .await?;
        let data = response.into_data()?;
        let items: Vec<ServerExtension> = if data.is_null() {
            Vec::new()
        } else {
            serde_json::from_value(data)
                .map_err(|e| Error::transport(format!("Invalid extension list: {}", e)))?
        };
        debug!("Server published {} extensions", items.len());
        self.handle_server_extensions(items)
    }

    fn placeholder(&self, account: &str, item: &ServerExtension) -> Result<SharedExtension> {
        let pkg = item
            .manifest()
            .map_err(|e| Error::invalid_manifest(&item.name, e))?;
        let ext = Extension::create(pkg, RuntimeData::default());
        restore_extension_data(self.store.as_ref(), &ext);

        let dir = self.paths.user_extensions_dir(account);
        let web_view_only = item.is_web_view_only();
        ext.update_data(|data| {
            data.is_remote = Some(true);
            data.server_data = item.data.clone();
            data.local_path = Some(dir.join(ext.name()));
            data.remote_cache_path = Some(dir.join(format!("{}.zip", ext.name())));
            data.remote_loaded = web_view_only;
            data.load_remote_failed = false;
            data.download_progress = None;
        });
        Ok(Arc::new(ext))
    }

    fn handle_server_extensions(self: &Arc<Self>, items: Vec<ServerExtension>) -> Result<()> {
        let added = {
            let mut session = self.session.lock();
            let session = session.as_mut().ok_or(Error::SessionClosed)?;
            let mut added = Vec::with_capacity(items.len());
            for item in &items {
                let ext = match self.placeholder(&session.account, item) {
                    Ok(ext) => ext,
                    Err(e) => {
                        warn!("Skipping remote extension {}: {}", item.name, e);
                        continue;
                    }
                };
                match session.queue.iter().position(|e| e.name() == ext.name()) {
                    Some(index) => {
                        session.queue[index].detach();
                        session.queue[index] = ext.clone();
                    }
                    None => session.queue.insert(0, ext.clone()),
                }
                added.push(ext);
            }
            added
        };

        if !added.is_empty() {
            self.notify(&added, ChangeAction::Add);
        }

        let inner = self.clone();
        tokio::spawn(async move { inner.drain().await });
        Ok(())
    }

    async fn drain(self: &Arc<Self>) {
        loop {
            if self
                .processing
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }
            while let Some((ext, cancel)) = self.next_pending() {
                self.process(ext, cancel).await;
            }
            self.processing.store(false, Ordering::SeqCst);
            self.idle.notify_waiters();

            // Items queued after the last check but before the flag was released
            if self.next_pending().is_none() {
                return;
            }
        }
    }

    async fn process(&self, ext: SharedExtension, cancel: CancellationToken) {
        debug!("Resolving remote extension {}", ext.name());
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(Error::SessionClosed),
            result = self.resolve(&ext) => result,
        };

        match result.and_then(|pkg| self.build_loaded(&ext, pkg)) {
            Ok(loaded) => self.swap(&ext, loaded),
            Err(e) => {
                warn!("Failed to load remote extension {}: {}", ext.name(), e);
                ext.set_load_remote_result(false, Some(e.to_string()));
                if self.is_queued(&ext) {
                    self.notify(&[ext], ChangeAction::Update);
                }
            }
        }
    }

    /// Make the package available on disk and read its manifest
    async fn resolve(&self, ext: &SharedExtension) -> Result<Value> {
        let local_path = ext
            .local_path()
            .ok_or_else(|| Error::invalid_manifest(ext.name(), "remote extension has no path"))?;

        if !self.check_cache(ext, &local_path).await {
            self.fetch_package(ext, &local_path).await?;
        }

        let manifest_path = local_path.join(MANIFEST_FILE);
        let pkg = self
            .fs
            .read_json(&manifest_path)
            .await
            .map_err(|e| Error::invalid_manifest(manifest_path.display().to_string(), e))?;
        match pkg.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {
                if name != ext.name() {
                    warn!(
                        "Remote extension {} unpacked a package named {}",
                        ext.name(),
                        name
                    );
                }
                Ok(pkg)
            }
            _ => Err(Error::invalid_manifest(
                manifest_path.display().to_string(),
                "package has no name",
            )),
        }
    }

    /// The unpacked package matches what the server declares
    async fn check_cache(&self, ext: &Extension, local_path: &Path) -> bool {
        if !self.fs.exists(local_path).await {
            return false;
        }
        let cached = DigestRecord::read(self.fs.as_ref(), local_path).await;
        if cached.is_some_and(|record| record.matches(ext.md5(), ext.download_url())) {
            debug!("Using cached package of {}", ext.name());
            return true;
        }
        if let Err(e) = self.fs.empty_dir(local_path).await {
            warn!("Failed to clear stale package of {}: {}", ext.name(), e);
        }
        false
    }

    async fn fetch_package(&self, ext: &SharedExtension, local_path: &Path) -> Result<()> {
        let url = ext
            .download_url()
            .ok_or_else(|| Error::download(ext.name(), "no download url"))?
            .to_string();
        let archive: PathBuf = ext
            .remote_cache_path()
            .unwrap_or_else(|| local_path.with_extension("zip"));

        let on_progress = |progress: f64| {
            ext.set_download_progress(progress);
            if self.is_queued(ext) {
                self.notify(&[ext.clone()], ChangeAction::Update);
            }
        };
        self.downloader.download(&url, &archive, &on_progress).await?;

        match ext.md5() {
            Some(expected) => {
                let (name, path, expected) =
                    (ext.name().to_string(), archive.clone(), expected.to_string());
                let verified = tokio::task::spawn_blocking(move || {
                    verify_md5(&name, &path, &expected)
                })
                .await
                .map_err(|e| Error::Io(std::io::Error::other(e)))
                .and_then(|verified| verified);
                if let Err(e) = verified {
                    self.remove_archive(&archive).await;
                    return Err(e);
                }
            }
            None => warn!("Remote extension {} declares no digest", ext.name()),
        }

        let extracted = self.fs.extract_archive(&archive, local_path).await;
        self.remove_archive(&archive).await;
        extracted?;

        DigestRecord::new(ext.md5(), Some(&url))
            .write(self.fs.as_ref(), local_path)
            .await?;
        info!("Unpacked remote extension {} to {:?}", ext.name(), local_path);
        Ok(())
    }

    async fn remove_archive(&self, archive: &Path) {
        if let Err(e) = self.fs.remove(archive).await {
            warn!("Failed to remove {:?}: {}", archive, e);
        }
    }

    /// Loaded extension built from the unpacked manifest and the placeholder
    fn build_loaded(&self, placeholder: &Extension, pkg: Value) -> Result<SharedExtension> {
        let server = placeholder.pkg();
        let base = json!({ "icon": server.icon });
        let overrides = json!({
            "download": server.download,
            "md5": server.md5,
            "entryUrl": server.entry_url,
            "entryID": server.entry_id,
        });
        let merged = merge_values(merge_values(base, pkg), overrides);
        let manifest = PackageManifest::from_value(merged)
            .map_err(|e| Error::invalid_manifest(placeholder.name(), e))?;

        placeholder.set_load_remote_result(true, None);
        let ext = Arc::new(Extension::create(manifest, placeholder.data()));
        ext.hot_attach(self.loader.as_ref());
        Ok(ext)
    }

    fn swap(&self, placeholder: &SharedExtension, loaded: SharedExtension) {
        let swapped = {
            let mut session = self.session.lock();
            match session
                .as_mut()
                .and_then(|s| s.queue.iter_mut().find(|e| Arc::ptr_eq(e, placeholder)))
            {
                Some(slot) => {
                    *slot = loaded.clone();
                    true
                }
                None => false,
            }
        };

        if swapped {
            info!("Loaded remote extension {}", loaded.name());
            self.notify(&[placeholder.clone()], ChangeAction::Remove);
            self.notify(&[loaded], ChangeAction::Add);
        } else {
            debug!("Discarding stale remote extension {}", loaded.name());
            loaded.detach();
        }
    }
}
