//! Persistent registry of locally installed extensions
//!
//! The registry owns the ordered list of installed extensions and mirrors it
//! to the key-value store under [`DATABASE_KEY`] after every mutation.
//! Remote extensions are never stored here: saving one only forwards an
//! update notification.

use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};
use xext_core::types::{ExtensionRecord, RuntimeData};
use xext_core::utils::now_millis;
use xext_core::{Error, KeyValueStore, Result};

use crate::events::{ChangeAction, ChangeListener};
use crate::extension::{Extension, SharedExtension};

/// Store key of the installed collection
pub const DATABASE_KEY: &str = "EXTENSIONS::database";

/// Config entry holding an extension's saved runtime data
const DATA_CONFIG_KEY: &str = "_data";

/// Store key of an extension's config object
pub fn config_key(name: &str) -> String {
    format!("EXTENSION::{}::config", name)
}

/// Read an extension's config object
pub fn extension_config(store: &dyn KeyValueStore, name: &str) -> Map<String, Value> {
    match store.get(&config_key(name)) {
        Some(Value::Object(config)) => config,
        _ => Map::new(),
    }
}

/// Read one config value of an extension
pub fn get_extension_config(store: &dyn KeyValueStore, name: &str, key: &str) -> Option<Value> {
    extension_config(store, name).remove(key)
}

/// Set one config value of an extension
pub fn set_extension_config(
    store: &dyn KeyValueStore,
    name: &str,
    key: &str,
    value: Value,
) -> Result<()> {
    let mut config = extension_config(store, name);
    config.insert(key.to_string(), value);
    store.set(&config_key(name), Value::Object(config))
}

/// Overlay the runtime data saved in the extension's config
pub fn restore_extension_data(store: &dyn KeyValueStore, ext: &Extension) {
    let Some(saved) = get_extension_config(store, ext.name(), DATA_CONFIG_KEY) else {
        return;
    };
    match serde_json::from_value::<RuntimeData>(saved) {
        Ok(saved) => ext.merge_data(saved),
        Err(e) => warn!("Ignoring saved data of extension {}: {}", ext.name(), e),
    }
}

fn load_records(store: &dyn KeyValueStore) -> Vec<ExtensionRecord> {
    let entries = match store.get(DATABASE_KEY) {
        Some(Value::Array(entries)) => entries,
        Some(_) => {
            warn!("Ignoring extension database: {} is not a list", DATABASE_KEY);
            return Vec::new();
        }
        None => return Vec::new(),
    };
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_json::from_value::<ExtensionRecord>(entry) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping malformed extension record #{}: {}", index, e);
                    None
                }
            }
        })
        .collect()
}

/// Installed extensions backed by a key-value store
pub struct ExtensionDatabase {
    store: Arc<dyn KeyValueStore>,
    installs: RwLock<Vec<SharedExtension>>,
    listener: RwLock<Option<Arc<dyn ChangeListener>>>,
}

impl ExtensionDatabase {
    /// Load the installed collection from the store
    ///
    /// Records that fail to parse are skipped with a warning.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let installs: Vec<SharedExtension> = load_records(store.as_ref())
            .into_iter()
            .map(|record| {
                let ext = Extension::from_record(record);
                restore_extension_data(store.as_ref(), &ext);
                Arc::new(ext)
            })
            .collect();
        debug!("Loaded {} installed extensions", installs.len());

        Self {
            store,
            installs: RwLock::new(installs),
            listener: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Register the single change listener
    pub fn set_listener(&self, listener: Arc<dyn ChangeListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Installed extensions in install order
    pub fn list(&self) -> Vec<SharedExtension> {
        self.installs.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<SharedExtension> {
        self.installs
            .read()
            .iter()
            .find(|ext| ext.name() == name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.installs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace an extension
    pub fn upsert(&self, ext: SharedExtension, override_existing: bool) -> Result<SharedExtension> {
        self.upsert_with(ext, override_existing, |_| {})
    }

    /// Insert or replace an extension, running `after_save` once the entry
    /// is persisted and in place but before it is announced
    ///
    /// Fails with `AlreadyInstalled` when the name is taken and
    /// `override_existing` is false. When the store write fails the
    /// collection is left as it was and `after_save` does not run.
    ///
    /// Replacing keeps the previous entry's position and runtime data, with
    /// fields set on the new extension taking precedence, so the original
    /// install time survives.
    pub fn upsert_with<F>(
        &self,
        ext: SharedExtension,
        override_existing: bool,
        after_save: F,
    ) -> Result<SharedExtension>
    where
        F: FnOnce(&SharedExtension),
    {
        if ext.is_remote() {
            self.notify(&[ext.clone()], ChangeAction::Update);
            return Ok(ext);
        }

        let action = {
            let mut installs = self.installs.write();
            let mut candidate = installs.clone();
            let action = match candidate.iter().position(|old| old.name() == ext.name()) {
                Some(index) => {
                    if !override_existing {
                        return Err(Error::already_installed(ext.name()));
                    }
                    let mut data = candidate[index].data();
                    data.overlay(ext.data());
                    ext.update_data(|current| *current = data);
                    ext.set_update_time(now_millis());
                    candidate[index] = ext.clone();
                    ChangeAction::Update
                }
                None => {
                    if ext.install_time().is_none() {
                        ext.mark_installed();
                    }
                    candidate.push(ext.clone());
                    ChangeAction::Add
                }
            };
            self.persist(&candidate)?;
            *installs = candidate;
            action
        };

        // Hooks run without the registry lock held
        after_save(&ext);

        info!(
            "Saved extension {} {} ({})",
            ext.name(),
            ext.version().unwrap_or("?"),
            action
        );
        self.notify(&[ext.clone()], action);
        Ok(ext)
    }

    /// Remove an installed extension by name
    pub fn remove(&self, name: &str) -> Result<SharedExtension> {
        let removed = {
            let mut installs = self.installs.write();
            let index = installs
                .iter()
                .position(|ext| ext.name() == name)
                .ok_or_else(|| Error::not_found(name))?;
            let mut candidate = installs.clone();
            let removed = candidate.remove(index);
            self.persist(&candidate)?;
            *installs = candidate;
            removed
        };

        info!("Removed extension {}", name);
        self.notify(&[removed.clone()], ChangeAction::Remove);
        Ok(removed)
    }

    /// Save an extension's runtime data to its config, and the collection
    /// when the extension is installed
    pub fn save_data(&self, ext: &Extension) -> Result<()> {
        let data = serde_json::to_value(ext.data().persistent())?;
        set_extension_config(self.store.as_ref(), ext.name(), DATA_CONFIG_KEY, data)?;

        let installs = self.installs.read();
        if installs.iter().any(|installed| installed.name() == ext.name()) {
            self.persist(&installs)?;
        }
        Ok(())
    }

    fn persist(&self, installs: &[SharedExtension]) -> Result<()> {
        let records: Vec<ExtensionRecord> = installs.iter().map(|ext| ext.record()).collect();
        self.store.set(DATABASE_KEY, serde_json::to_value(records)?)
    }

    fn notify(&self, extensions: &[SharedExtension], action: ChangeAction) {
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener.on_change(extensions, action);
        }
    }
}
