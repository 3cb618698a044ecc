//! Persistent registry integration tests
//!
//! Tests the installed collection including:
//! - Insert, override and remove rules
//! - Change notifications
//! - Persistence round trips through the JSON file store
//! - Saved runtime data

mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use xext_core::store::{JsonFileStore, KeyValueStore};
use xext_core::types::{PackageManifest, RuntimeData};
use xext_extensions::registry::{
    get_extension_config, restore_extension_data, set_extension_config, DATABASE_KEY,
};
use xext_extensions::{
    ChangeAction, Extension, ExtensionDatabase, ExtensionKind, SharedExtension,
};

fn extension(manifest: &ManifestBuilder) -> SharedExtension {
    extension_with(manifest, RuntimeData::default())
}

fn extension_with(manifest: &ManifestBuilder, data: RuntimeData) -> SharedExtension {
    let pkg = PackageManifest::from_value(manifest.build()).unwrap();
    Arc::new(Extension::create(pkg, data))
}

fn open_store(temp: &TempDir) -> Arc<dyn KeyValueStore> {
    Arc::new(JsonFileStore::open(temp.path().join("store.json")).unwrap())
}

#[cfg(test)]
mod registry {
    use super::*;

    #[test]
    fn test_insert_without_override_rejects_existing_name() {
        let temp = TempDir::new().unwrap();
        let db = ExtensionDatabase::open(open_store(&temp));
        db.upsert(extension(&ManifestBuilder::theme("x")), false)
            .unwrap();

        let result = db.upsert(
            extension(&ManifestBuilder::theme("x").version("2.0.0")),
            false,
        );

        assert_error_code(result, "EXT_NAME_ALREADY_INSTALLED");
        assert_eq!(db.len(), 1);
        assert_eq!(db.get("x").unwrap().version(), Some("1.0.0"));
    }

    #[test]
    fn test_override_keeps_install_time_and_custom_data() {
        let temp = TempDir::new().unwrap();
        let db = ExtensionDatabase::open(open_store(&temp));
        let first = db
            .upsert(extension(&ManifestBuilder::app("x").web_view("https://x")), false)
            .unwrap();
        first.set_install_time(1_000);
        first.set_pinned_on_menu(true, Some(3));

        let second = db
            .upsert(
                extension(&ManifestBuilder::app("x").web_view("https://x").version("2.0.0")),
                true,
            )
            .unwrap();

        assert_eq!(db.len(), 1);
        assert_eq!(second.version(), Some("2.0.0"));
        assert_eq!(second.install_time(), Some(1_000));
        assert!(second.update_time().unwrap() > 1_000);
        assert_eq!(second.as_app().unwrap().pinned_on_menu_order(), Some(3));
        assert!(Arc::ptr_eq(&db.get("x").unwrap(), &second));
    }

    #[test]
    fn test_mutations_notify_listener() {
        let temp = TempDir::new().unwrap();
        let db = ExtensionDatabase::open(open_store(&temp));
        let listener = RecordingListener::new();
        db.set_listener(listener.clone());

        db.upsert(extension(&ManifestBuilder::theme("a")), false)
            .unwrap();
        db.upsert(extension(&ManifestBuilder::theme("a")), true)
            .unwrap();
        db.remove("a").unwrap();

        assert_eq!(
            listener.actions_for("a"),
            vec![ChangeAction::Add, ChangeAction::Update, ChangeAction::Remove]
        );
        assert_error_code(db.remove("a"), "EXT_NOT_FOUND");
    }

    #[test]
    fn test_remote_extensions_are_not_stored() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let db = ExtensionDatabase::open(store.clone());
        let listener = RecordingListener::new();
        db.set_listener(listener.clone());

        let remote = extension_with(
            &ManifestBuilder::plugin("cloud"),
            RuntimeData {
                is_remote: Some(true),
                ..Default::default()
            },
        );
        db.upsert(remote, false).unwrap();

        assert!(db.is_empty());
        assert!(store.get(DATABASE_KEY).is_none());
        assert_eq!(listener.actions_for("cloud"), vec![ChangeAction::Update]);
    }

    #[test]
    fn test_round_trip_through_file_store() {
        let temp = TempDir::new().unwrap();
        {
            let db = ExtensionDatabase::open(open_store(&temp));
            db.upsert(extension(&ManifestBuilder::theme("one")), false)
                .unwrap();
            let two = db
                .upsert(
                    extension(&ManifestBuilder::plugin("two").main("index.js").version("3.1.0")),
                    false,
                )
                .unwrap();
            two.set_disabled(true);
            two.set_load_remote_result(true, None);
            db.save_data(&two).unwrap();
            db.upsert(
                extension_with(
                    &ManifestBuilder::app("three").web_view("https://three"),
                    RuntimeData {
                        is_dev: Some(true),
                        ..Default::default()
                    },
                ),
                false,
            )
            .unwrap();
        }

        let reopened = ExtensionDatabase::open(open_store(&temp));
        assert_names(&reopened.list(), &["one", "two", "three"]);

        let two = reopened.get("two").unwrap();
        assert_eq!(two.version(), Some("3.1.0"));
        assert!(two.is_disabled());
        assert!(!two.remote_loaded());
        assert!(two.install_time().is_some());
        assert!(reopened.get("three").unwrap().is_dev());
        assert_eq!(reopened.get("one").unwrap().kind(), ExtensionKind::Theme);
    }

    #[test]
    fn test_saved_data_applies_to_unlisted_extensions() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let db = ExtensionDatabase::open(store.clone());

        let builtin = extension(&ManifestBuilder::app("clock").web_view("https://clock"));
        builtin.set_disabled(true);
        db.save_data(&builtin).unwrap();
        assert!(db.is_empty());

        set_extension_config(store.as_ref(), "clock", "zone", json!("UTC")).unwrap();

        let store = open_store(&temp);
        let fresh = extension(&ManifestBuilder::app("clock").web_view("https://clock"));
        restore_extension_data(store.as_ref(), &fresh);
        assert!(fresh.is_disabled());
        assert_eq!(
            get_extension_config(store.as_ref(), "clock", "zone"),
            Some(json!("UTC"))
        );
    }

    #[test]
    fn test_invalid_names_get_unique_fallbacks() {
        let a = extension(&ManifestBuilder::plugin("bad name!").main("index.js"));
        let b = extension(&ManifestBuilder::plugin("").main("index.js"));

        assert!(a.name().starts_with("extension-"));
        assert!(b.name().starts_with("extension-"));
        assert_ne!(a.name(), b.name());
        assert_issue_fields(&a, &["name"]);
        assert_issue_fields(&b, &["name"]);
    }

    #[test]
    fn test_fallback_name_keeps_config_across_reopen() {
        let temp = TempDir::new().unwrap();
        let db = ExtensionDatabase::open(open_store(&temp));
        let ext = db
            .upsert(extension(&ManifestBuilder::plugin("bad name!").main("index.js")), false)
            .unwrap();
        let name = ext.name().to_string();
        set_extension_config(db.store().as_ref(), &name, "zone", json!("UTC")).unwrap();
        drop(db);

        let store = open_store(&temp);
        let reopened = ExtensionDatabase::open(store.clone());
        assert!(reopened.contains(&name));
        assert_eq!(
            get_extension_config(store.as_ref(), &name, "zone"),
            Some(json!("UTC"))
        );
    }
}
