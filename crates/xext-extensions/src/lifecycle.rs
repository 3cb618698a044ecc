//! Lifecycle controller
//!
//! The controller owns the in-memory collection the rest of the host reads:
//! built-in, installed and remote extensions in one sorted list, plus
//! per-type views of the enabled ones. It listens to the registry and the
//! remote sync engine, applies their changes and re-broadcasts them to
//! subscribers.

use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use xext_core::{Error, Result};

use crate::events::{ChangeAction, ChangeListener, ExtensionChange};
use crate::extension::{ExtensionKind, ModuleLoader, SharedExtension};
use crate::registry::ExtensionDatabase;
use crate::search::{parse_keys, rank};

/// Capacity of the change broadcast channel
const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
struct Collection {
    all: Vec<SharedExtension>,
    apps: Vec<SharedExtension>,
    themes: Vec<SharedExtension>,
    plugins: Vec<SharedExtension>,
}

impl Collection {
    fn sort(&mut self) {
        self.all.sort_by(|a, b| compare_extensions(a, b));
    }

    /// Rebuild the per-type views from the enabled extensions
    fn regroup(&mut self) {
        let enabled = || self.all.iter().filter(|ext| !ext.is_disabled());
        let of_kind = |kind: ExtensionKind| -> Vec<SharedExtension> {
            enabled().filter(|e| e.kind() == kind).cloned().collect()
        };
        let (apps, themes, plugins) = (
            of_kind(ExtensionKind::App),
            of_kind(ExtensionKind::Theme),
            of_kind(ExtensionKind::Plugin),
        );
        self.apps = apps;
        self.themes = themes;
        self.plugins = plugins;
    }

    fn position(&self, ext: &SharedExtension) -> Option<usize> {
        self.all
            .iter()
            .position(|e| Arc::ptr_eq(e, ext))
            .or_else(|| self.all.iter().position(|e| e.name() == ext.name()))
    }
}

/// Collection order: dev first, then enabled, then local, then newest
pub fn compare_extensions(a: &SharedExtension, b: &SharedExtension) -> Ordering {
    b.is_dev()
        .cmp(&a.is_dev())
        .then_with(|| a.is_disabled().cmp(&b.is_disabled()))
        .then_with(|| a.is_remote().cmp(&b.is_remote()))
        .then_with(|| {
            b.install_time()
                .unwrap_or(0)
                .cmp(&a.install_time().unwrap_or(0))
        })
}

/// Authoritative in-memory extension collection
pub struct LifecycleController {
    db: Arc<ExtensionDatabase>,
    loader: Arc<dyn ModuleLoader>,
    collection: RwLock<Collection>,
    events: broadcast::Sender<ExtensionChange>,
}

impl LifecycleController {
    pub fn new(db: Arc<ExtensionDatabase>, loader: Arc<dyn ModuleLoader>) -> Arc<Self> {
        let (events, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Arc::new(Self {
            db,
            loader,
            collection: RwLock::new(Collection::default()),
            events,
        })
    }

    /// Build the collection from the built-ins and the registry, and start
    /// listening to registry changes
    ///
    /// Installed extensions whose name is taken by a built-in are skipped.
    pub fn init(self: &Arc<Self>, builtins: Vec<SharedExtension>) {
        let mut names: HashSet<String> = HashSet::new();
        let mut all = Vec::with_capacity(builtins.len() + self.db.len());
        for ext in builtins.into_iter().chain(self.db.list()) {
            if names.insert(ext.name().to_string()) {
                all.push(ext);
            } else {
                warn!("Ignoring duplicate extension {}", ext.name());
            }
        }

        {
            let mut collection = self.collection.write();
            collection.all = all;
            collection.sort();
            collection.regroup();
            info!(
                "Loaded {} extensions ({} apps, {} themes, {} plugins)",
                collection.all.len(),
                collection.apps.len(),
                collection.themes.len(),
                collection.plugins.len()
            );
        }

        self.db.set_listener(self.clone());
    }

    /// Attach every enabled extension and run its ready hook
    ///
    /// Returns how many modules were loaded.
    pub fn attach_all(&self) -> usize {
        let attached = self
            .all()
            .iter()
            .filter(|ext| ext.attach_ready(self.loader.as_ref()))
            .count();
        debug!("Attached {} extension modules", attached);
        attached
    }

    /// Detach every loaded extension
    pub fn detach_all(&self) -> usize {
        self.all().iter().filter(|ext| ext.detach()).count()
    }

    /// Receive every change applied to the collection
    pub fn subscribe(&self) -> broadcast::Receiver<ExtensionChange> {
        self.events.subscribe()
    }

    pub fn database(&self) -> &Arc<ExtensionDatabase> {
        &self.db
    }

    /// Every extension in collection order
    pub fn all(&self) -> Vec<SharedExtension> {
        self.collection.read().all.clone()
    }

    /// Enabled apps
    pub fn apps(&self) -> Vec<SharedExtension> {
        self.collection.read().apps.clone()
    }

    /// Enabled theme extensions
    pub fn themes(&self) -> Vec<SharedExtension> {
        self.collection.read().themes.clone()
    }

    /// Enabled plugins
    pub fn plugins(&self) -> Vec<SharedExtension> {
        self.collection.read().plugins.clone()
    }

    /// Enabled extensions of one kind
    pub fn of_kind(&self, kind: ExtensionKind) -> Vec<SharedExtension> {
        match kind {
            ExtensionKind::App => self.apps(),
            ExtensionKind::Theme => self.themes(),
            ExtensionKind::Plugin => self.plugins(),
        }
    }

    pub fn get(&self, name: &str) -> Option<SharedExtension> {
        self.collection
            .read()
            .all
            .iter()
            .find(|ext| ext.name() == name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.collection.read().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rank extensions against a query, best first
    ///
    /// With a kind only enabled extensions of that kind are searched.
    pub fn search(&self, query: &str, kind: Option<ExtensionKind>) -> Vec<(SharedExtension, u32)> {
        let keys = parse_keys(query);
        let candidates = match kind {
            Some(kind) => self.of_kind(kind),
            None => self.all(),
        };
        rank(candidates, |ext| ext.match_score(&keys))
    }

    /// App opened on startup
    pub fn default_app(&self) -> Option<SharedExtension> {
        let apps: Vec<SharedExtension> = self
            .apps()
            .into_iter()
            .filter(|ext| ext.is_available())
            .collect();
        apps.iter()
            .find(|ext| ext.as_app().is_some_and(|app| app.is_default()))
            .or_else(|| apps.first())
            .cloned()
    }

    /// Available apps pinned on the main menu, in pin order
    pub fn menu_apps(&self) -> Vec<SharedExtension> {
        let mut apps: Vec<SharedExtension> = self
            .apps()
            .into_iter()
            .filter(|ext| {
                ext.is_available() && ext.as_app().is_some_and(|app| app.is_pinned_on_menu())
            })
            .collect();
        apps.sort_by_key(|ext| {
            ext.as_app()
                .and_then(|app| app.pinned_on_menu_order())
                .unwrap_or(i64::MAX)
        });
        apps
    }

    /// Enable or disable an extension
    ///
    /// Hot extensions are detached before disabling and re-attached after
    /// enabling. Other extensions keep their module until restart and
    /// report `need_restart`.
    pub fn set_disabled(&self, name: &str, disabled: bool) -> Result<SharedExtension> {
        let ext = self.get(name).ok_or_else(|| Error::not_found(name))?;
        if ext.is_disabled() == disabled {
            return Ok(ext);
        }

        if disabled {
            if ext.is_hot() {
                ext.detach();
            }
            ext.set_disabled(true);
        } else {
            ext.set_disabled(false);
            ext.hot_attach(self.loader.as_ref());
        }
        self.db.save_data(&ext)?;

        info!(
            "{} extension {}{}",
            if disabled { "Disabled" } else { "Enabled" },
            name,
            if ext.need_restart() { " (restart required)" } else { "" }
        );
        self.on_change(&[ext.clone()], ChangeAction::Update);
        Ok(ext)
    }

    pub fn enable(&self, name: &str) -> Result<SharedExtension> {
        self.set_disabled(name, false)
    }

    pub fn disable(&self, name: &str) -> Result<SharedExtension> {
        self.set_disabled(name, true)
    }

    /// Pin or unpin an app on the main menu
    pub fn set_pinned_on_menu(&self, name: &str, pinned: bool) -> Result<SharedExtension> {
        let ext = self.get(name).ok_or_else(|| Error::not_found(name))?;
        let app = ext
            .as_app()
            .ok_or_else(|| Error::kind_mismatch(ExtensionKind::App.as_str(), ext.kind().as_str()))?;
        if !app.can_pin_on_menu() {
            debug!("App {} cannot be pinned", name);
            return Ok(ext);
        }

        let order = pinned.then(|| {
            self.menu_apps()
                .iter()
                .filter_map(|e| e.as_app().and_then(|app| app.pinned_on_menu_order()))
                .max()
                .map_or(0, |max| max + 1)
        });
        ext.set_pinned_on_menu(pinned, order);
        self.db.save_data(&ext)?;
        self.on_change(&[ext.clone()], ChangeAction::Update);
        Ok(ext)
    }
}

impl ChangeListener for LifecycleController {
    fn on_change(&self, extensions: &[SharedExtension], action: ChangeAction) {
        {
            let mut collection = self.collection.write();
            let mut added = false;
            for ext in extensions {
                let position = collection.position(ext);
                match (action, position) {
                    (ChangeAction::Remove, Some(index)) => {
                        collection.all.remove(index);
                    }
                    (ChangeAction::Remove, None) => {}
                    (_, Some(index)) => collection.all[index] = ext.clone(),
                    (_, None) => {
                        collection.all.push(ext.clone());
                        added = true;
                    }
                }
            }
            if added {
                collection.sort();
            }
            collection.regroup();
        }

        debug!(
            "Extensions {}: {}",
            action,
            extensions.iter().map(|e| e.name()).collect::<Vec<_>>().join(", ")
        );
        // No subscribers is fine
        let _ = self.events.send(ExtensionChange {
            action,
            extensions: extensions.to_vec(),
        });
    }
}
