//! Extension model
//!
//! An [`Extension`] pairs an immutable package manifest with mutable runtime
//! data and the state of its loaded module. It is always handled through a
//! [`SharedExtension`] so that the registry, the lifecycle controller and
//! the remote sync engine observe the same instance.
//!
//! Manifest problems never fail construction: they are recorded as
//! [`ValidationIssue`]s and the extension falls back to a usable default.

mod app;
mod module;
mod theme;

pub use app::{AppProfile, AppType, AppView, DEFAULT_ACCENT_COLOR};
pub use module::{EmptyModule, ExtensionModule, Hook, MainFile, ModuleLoader, StaticModuleLoader};
pub use theme::{Theme, ThemeCandidate, ThemeId, ThemeInject, THEME_MATCH_RULES};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use xext_core::types::{ExtensionRecord, PackageManifest, RuntimeData, ThemeManifest};
use xext_core::utils::{now_millis, time_sequence};
use xext_core::{Error, Result};

use crate::pinyin::transliterate;
use crate::search::{match_score, FieldValue, MatchRule, Matchable};

/// Extension handle shared across the host
pub type SharedExtension = Arc<Extension>;

/// Icon of extensions that declare none
pub const DEFAULT_ICON: &str = "mdi-cube";

/// Entry point assumed for plugins that declare none
pub const DEFAULT_MAIN: &str = "index.js";

/// Field weights for extension search
pub const EXTENSION_MATCH_RULES: &[MatchRule] = &[
    MatchRule::new("name", 100, 50),
    MatchRule::new("displayName", 100, 50),
    MatchRule::new("pinyinNames", 50, 25).array(),
    MatchRule::new("description", 0, 25),
    MatchRule::new("keywords", 50, 10).array(),
    MatchRule::new("type", 100, 0).prefixed("#"),
    MatchRule::new("author", 100, 0).prefixed("@"),
    MatchRule::new("publisher", 100, 0).prefixed("@"),
    MatchRule::new("homepage", 0, 25),
];

/// Extension specialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtensionKind {
    App,
    Theme,
    Plugin,
}

impl ExtensionKind {
    pub const ALL: [ExtensionKind; 3] = [Self::App, Self::Theme, Self::Plugin];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "app" => Some(Self::App),
            "theme" => Some(Self::Theme),
            "plugin" => Some(Self::Plugin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Theme => "theme",
            Self::Plugin => "plugin",
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A problem found in a manifest field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone)]
enum Variant {
    Base,
    App(AppProfile),
    Theme(Vec<Theme>),
    Plugin,
}

#[derive(Default)]
struct ModuleSlot {
    module: Option<Arc<dyn ExtensionModule>>,
    loaded: bool,
    restart_pending: bool,
    load_time: Option<Duration>,
}

/// An installed, built-in or remote extension
pub struct Extension {
    name: String,
    kind: ExtensionKind,
    variant: Variant,
    pkg: PackageManifest,
    data: RwLock<RuntimeData>,
    issues: Mutex<Vec<ValidationIssue>>,
    slot: Mutex<ModuleSlot>,
    pinyin_names: OnceLock<Vec<String>>,
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |value| value.trim().is_empty())
}

fn is_remote_url(value: &str) -> bool {
    value.starts_with("http://")
        || value.starts_with("https://")
        || value.starts_with("file://")
        || value.starts_with("data:")
}

/// Resolve a package-relative asset to a `file://` URL
pub(crate) fn resolve_asset(value: &str, local_path: Option<&Path>) -> String {
    match local_path {
        Some(dir) if !is_remote_url(value) => format!("file://{}", dir.join(value).display()),
        _ => value.to_string(),
    }
}

/// Resolve an icon, keeping icon-font names as they are
pub(crate) fn resolve_icon(value: &str, local_path: Option<&Path>) -> String {
    if value.len() > 1 && !value.starts_with("mdi-") && !value.starts_with("icon") {
        resolve_asset(value, local_path)
    } else {
        value.to_string()
    }
}

impl Extension {
    /// Build an extension from an installed or downloaded package
    ///
    /// Built-in markers are stripped: only bundled packages may claim
    /// statically registered modules.
    pub fn create(mut pkg: PackageManifest, data: RuntimeData) -> Self {
        pkg.build_in = None;
        Self::assemble(pkg, data)
    }

    /// Build a bundled extension, honoring its built-in marker
    pub fn create_builtin(pkg: PackageManifest, data: RuntimeData) -> Self {
        Self::assemble(pkg, data)
    }

    /// Rebuild an extension from its stored projection
    pub fn from_record(record: ExtensionRecord) -> Self {
        Self::create(record.pkg, record.data)
    }

    /// Build an app, rejecting manifests that declare another type
    pub fn new_app(pkg: PackageManifest, data: RuntimeData) -> Result<Self> {
        Self::expect_kind(&pkg, ExtensionKind::App)?;
        Ok(Self::create(pkg, data))
    }

    /// Build a theme extension, rejecting manifests that declare another type
    pub fn new_theme(pkg: PackageManifest, data: RuntimeData) -> Result<Self> {
        Self::expect_kind(&pkg, ExtensionKind::Theme)?;
        Ok(Self::create(pkg, data))
    }

    /// Build a plugin, rejecting manifests that declare another type
    pub fn new_plugin(pkg: PackageManifest, data: RuntimeData) -> Result<Self> {
        Self::expect_kind(&pkg, ExtensionKind::Plugin)?;
        Ok(Self::create(pkg, data))
    }

    fn expect_kind(pkg: &PackageManifest, requested: ExtensionKind) -> Result<()> {
        let declared = pkg.kind.as_deref().unwrap_or("");
        if ExtensionKind::parse(declared) == Some(requested) {
            Ok(())
        } else {
            Err(Error::kind_mismatch(requested.as_str(), declared))
        }
    }

    fn assemble(mut pkg: PackageManifest, mut data: RuntimeData) -> Self {
        let mut issues = Vec::new();

        let raw_name = pkg.name.clone().unwrap_or_default();
        let name = if is_valid_name(&raw_name) {
            raw_name
        } else {
            issues.push(ValidationIssue::new(
                "name",
                format!(
                    "Invalid extension name '{}': only letters, digits, '_' and '-' are allowed",
                    raw_name
                ),
            ));
            data.fallback_name
                .get_or_insert_with(|| format!("extension-{}", time_sequence()))
                .clone()
        };

        if is_blank(pkg.version.as_deref()) {
            issues.push(ValidationIssue::new("version", "Extension version is required"));
        }

        let declared = pkg.kind.clone().unwrap_or_default();
        let (kind, variant) = match ExtensionKind::parse(&declared) {
            Some(ExtensionKind::App) => {
                let profile = Self::validate_app(&pkg, &mut issues);
                (ExtensionKind::App, Variant::App(profile))
            }
            Some(ExtensionKind::Theme) => {
                let themes = match pkg.themes.as_deref() {
                    Some(themes) if !themes.is_empty() => {
                        Self::collect_themes(&name, themes, &mut issues)
                    }
                    _ => {
                        issues.push(ValidationIssue::new(
                            "themes",
                            "Theme extensions must declare at least one theme",
                        ));
                        Vec::new()
                    }
                };
                (ExtensionKind::Theme, Variant::Theme(themes))
            }
            Some(ExtensionKind::Plugin) => {
                let has_builtin_module = pkg
                    .build_in
                    .as_ref()
                    .is_some_and(|build_in| build_in.module.is_some());
                if is_blank(pkg.main.as_deref()) && !has_builtin_module {
                    pkg.main = Some(DEFAULT_MAIN.to_string());
                    issues.push(ValidationIssue::new(
                        "main",
                        format!("Plugin entry point is missing, using '{}'", DEFAULT_MAIN),
                    ));
                }
                (ExtensionKind::Plugin, Variant::Plugin)
            }
            None => {
                issues.push(ValidationIssue::new(
                    "type",
                    format!("Unknown extension type '{}', treated as plugin", declared),
                ));
                (ExtensionKind::Plugin, Variant::Base)
            }
        };

        if let Some(local_path) = pkg
            .build_in
            .as_ref()
            .and_then(|build_in| build_in.local_path.clone())
        {
            data.local_path = Some(local_path);
        }

        for issue in &issues {
            debug!("Extension {} manifest issue: {}", name, issue);
        }

        Self {
            name,
            kind,
            variant,
            pkg,
            data: RwLock::new(data),
            issues: Mutex::new(issues),
            slot: Mutex::new(ModuleSlot::default()),
            pinyin_names: OnceLock::new(),
        }
    }

    /// Theme names are unique within an extension; later duplicates are dropped
    fn collect_themes(
        extension: &str,
        manifests: &[ThemeManifest],
        issues: &mut Vec<ValidationIssue>,
    ) -> Vec<Theme> {
        let mut seen = HashSet::new();
        let mut themes = Vec::with_capacity(manifests.len());
        for manifest in manifests {
            if !seen.insert(manifest.name.as_str()) {
                issues.push(ValidationIssue::new(
                    "themes",
                    format!("Duplicate theme name '{}' is ignored", manifest.name),
                ));
                continue;
            }
            themes.push(Theme::new(extension, manifest.clone()));
        }
        themes
    }

    fn validate_app(pkg: &PackageManifest, issues: &mut Vec<ValidationIssue>) -> AppProfile {
        let has_url = !is_blank(pkg.web_view_url.as_deref());
        let app_type = match pkg.app_type.as_deref().and_then(AppType::parse) {
            Some(app_type) => app_type,
            None => {
                let inferred = if has_url {
                    AppType::WebView
                } else {
                    AppType::InsideView
                };
                issues.push(ValidationIssue::new(
                    "appType",
                    format!(
                        "App type '{}' is not supported, using '{}'",
                        pkg.app_type.as_deref().unwrap_or_default(),
                        inferred.as_str()
                    ),
                ));
                inferred
            }
        };

        if app_type == AppType::WebView && !has_url {
            issues.push(ValidationIssue::new(
                "webViewUrl",
                "Web view apps must declare webViewUrl",
            ));
        }

        AppProfile { app_type }
    }

    // Manifest accessors

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ExtensionKind {
        self.kind
    }

    pub fn pkg(&self) -> &PackageManifest {
        &self.pkg
    }

    pub fn display_name(&self) -> &str {
        self.pkg
            .display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn version(&self) -> Option<&str> {
        self.pkg.version.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.pkg.description.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.pkg.author_name()
    }

    /// Publisher, falling back to the author
    pub fn publisher(&self) -> Option<&str> {
        self.pkg.publisher.as_deref().or_else(|| self.author())
    }

    pub fn license(&self) -> Option<&str> {
        self.pkg.license.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.pkg.homepage.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.pkg.keywords
    }

    /// Supports attaching and detaching without a restart
    pub fn is_hot(&self) -> bool {
        self.pkg.hot
    }

    pub fn is_builtin(&self) -> bool {
        self.pkg.build_in.is_some()
    }

    /// Declares code that runs inside the host
    pub fn has_module(&self) -> bool {
        self.pkg.has_entry_point()
    }

    pub fn icon(&self) -> String {
        match self.pkg.icon.as_deref() {
            Some(icon) if !icon.is_empty() => {
                let local_path = self.local_path();
                resolve_icon(icon, local_path.as_deref())
            }
            _ => DEFAULT_ICON.to_string(),
        }
    }

    pub fn accent_color(&self) -> Option<&str> {
        self.pkg.accent_color.as_deref()
    }

    pub fn pinyin_names(&self) -> &[String] {
        self.pinyin_names
            .get_or_init(|| transliterate(self.display_name()))
    }

    /// App view, when this extension is an app
    pub fn as_app(&self) -> Option<AppView<'_>> {
        match &self.variant {
            Variant::App(profile) => Some(AppView::new(self, profile)),
            _ => None,
        }
    }

    /// Themes declared by a theme extension; empty for other kinds
    pub fn themes(&self) -> &[Theme] {
        match &self.variant {
            Variant::Theme(themes) => themes,
            _ => &[],
        }
    }

    pub fn get_theme(&self, name: &str) -> Option<&Theme> {
        self.themes().iter().find(|theme| theme.name() == name)
    }

    /// Manifest was of an unknown type
    pub fn is_generic(&self) -> bool {
        matches!(self.variant, Variant::Base)
    }

    // Validation issues

    pub fn issues(&self) -> Vec<ValidationIssue> {
        self.issues.lock().clone()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.lock().is_empty()
    }

    pub fn add_issue(&self, field: impl Into<String>, message: impl Into<String>) {
        let issue = ValidationIssue::new(field, message);
        debug!("Extension {} issue: {}", self.name, issue);
        self.issues.lock().push(issue);
    }

    // Runtime data

    /// Snapshot of the runtime data
    pub fn data(&self) -> RuntimeData {
        self.data.read().clone()
    }

    pub fn with_data<R>(&self, f: impl FnOnce(&RuntimeData) -> R) -> R {
        f(&self.data.read())
    }

    pub fn update_data<R>(&self, f: impl FnOnce(&mut RuntimeData) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Overlay the fields set in `newer`
    pub fn merge_data(&self, newer: RuntimeData) {
        self.data.write().overlay(newer);
    }

    pub fn install_time(&self) -> Option<i64> {
        self.data.read().install_time
    }

    /// Set the install time, which also counts as the latest update
    pub fn set_install_time(&self, time: i64) {
        let mut data = self.data.write();
        data.install_time = Some(time);
        data.update_time = Some(time);
    }

    pub fn update_time(&self) -> Option<i64> {
        self.data.read().update_time
    }

    pub fn set_update_time(&self, time: i64) {
        self.data.write().update_time = Some(time);
    }

    pub fn is_disabled(&self) -> bool {
        self.data.read().disabled.unwrap_or(false)
    }

    /// Change the disabled flag, returning whether it changed
    ///
    /// A change on an extension without hot-reload support only takes full
    /// effect after a restart.
    pub fn set_disabled(&self, disabled: bool) -> bool {
        let changed = {
            let mut data = self.data.write();
            let previous = data.disabled.unwrap_or(false);
            data.disabled = Some(disabled);
            previous != disabled
        };
        if changed && !self.is_hot() {
            self.slot.lock().restart_pending = true;
        }
        changed
    }

    pub fn is_dev(&self) -> bool {
        self.data.read().is_dev.unwrap_or(false)
    }

    pub fn is_remote(&self) -> bool {
        self.data.read().is_remote.unwrap_or(false)
    }

    pub fn remote_loaded(&self) -> bool {
        self.data.read().remote_loaded
    }

    pub fn load_remote_failed(&self) -> bool {
        self.data.read().load_remote_failed
    }

    /// Record the outcome of loading a remote package
    pub fn set_load_remote_result(&self, loaded: bool, error: Option<String>) {
        {
            let mut data = self.data.write();
            data.remote_loaded = loaded;
            data.load_remote_failed = !loaded;
        }
        if let Some(error) = error {
            self.add_issue("remote", error);
        }
    }

    /// Remote download progress from 0 to 1
    pub fn download_progress(&self) -> f64 {
        let data = self.data.read();
        if data.remote_loaded {
            1.0
        } else {
            data.download_progress.unwrap_or(0.0)
        }
    }

    pub fn set_download_progress(&self, progress: f64) {
        self.data.write().download_progress = Some(progress.clamp(0.0, 1.0));
    }

    pub fn local_path(&self) -> Option<PathBuf> {
        self.data.read().local_path.clone()
    }

    pub fn set_local_path(&self, path: impl Into<PathBuf>) {
        self.data.write().local_path = Some(path.into());
    }

    pub fn remote_cache_path(&self) -> Option<PathBuf> {
        self.data.read().remote_cache_path.clone()
    }

    pub fn server_data(&self) -> Option<serde_json::Value> {
        self.data.read().server_data.clone()
    }

    pub fn set_pinned_on_menu(&self, pinned: bool, order: Option<i64>) {
        let mut data = self.data.write();
        data.pinned_on_menu = Some(pinned);
        if order.is_some() {
            data.pinned_on_menu_order = order;
        }
    }

    pub fn add_notice(&self, count: u32) {
        let mut data = self.data.write();
        data.notice_count = Some(data.notice_count.unwrap_or(0).saturating_add(count));
    }

    pub fn clear_notice(&self) {
        self.data.write().notice_count = None;
    }

    // Remote entry points

    pub fn download_url(&self) -> Option<&str> {
        self.pkg.download.as_deref().filter(|url| !url.is_empty())
    }

    pub fn md5(&self) -> Option<&str> {
        self.pkg.md5.as_deref().filter(|md5| !md5.is_empty())
    }

    pub fn entry_url(&self) -> Option<&str> {
        self.pkg.entry_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Server-side entry identifier, defaulting to the extension name
    pub fn entry_id(&self) -> &str {
        self.pkg
            .entry_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.name)
    }

    /// Entry URLs must be resolved through the server
    pub fn has_server_entry(&self) -> bool {
        self.is_remote() && self.entry_url().is_some()
    }

    // Module lifecycle

    /// Where the module comes from, if the extension has one
    pub fn main_file(&self) -> Option<MainFile> {
        if let Some(module) = self
            .pkg
            .build_in
            .as_ref()
            .and_then(|build_in| build_in.module.clone())
        {
            return Some(MainFile::BuiltIn(module));
        }
        let main = self.pkg.main.as_deref().filter(|main| !main.is_empty())?;
        Some(MainFile::File(match self.local_path() {
            Some(dir) => dir.join(main),
            None => PathBuf::from(main),
        }))
    }

    pub fn is_module_loaded(&self) -> bool {
        self.slot.lock().loaded
    }

    pub fn module_load_time(&self) -> Option<Duration> {
        self.slot.lock().load_time
    }

    /// A state change is waiting for a restart to take effect
    pub fn need_restart(&self) -> bool {
        let slot = self.slot.lock();
        slot.restart_pending
            || (!self.is_disabled() && self.has_module() && !slot.loaded && !self.is_hot())
    }

    /// Usable in the current session
    pub fn is_available(&self) -> bool {
        !self.is_disabled() && !self.need_restart() && (!self.is_remote() || self.remote_loaded())
    }

    /// Load the module and run its attach hook
    ///
    /// Returns false when the extension is disabled, has no module or is
    /// already loaded. A module that fails to load is replaced by an empty
    /// one so that the extension still counts as attached.
    pub fn attach(&self, loader: &dyn ModuleLoader) -> bool {
        if self.is_disabled() {
            return false;
        }
        let Some(main) = self.main_file() else {
            return false;
        };
        if self.slot.lock().loaded {
            return false;
        }

        let start = Instant::now();
        let module = match loader.load(self, &main) {
            Ok(module) => module,
            Err(e) => {
                warn!("Failed to load module of extension {}: {:#}", self.name, e);
                self.add_issue("main", format!("Module failed to load: {}", e));
                Arc::new(EmptyModule) as Arc<dyn ExtensionModule>
            }
        };

        {
            let mut slot = self.slot.lock();
            slot.module = Some(module.clone());
            slot.loaded = true;
            slot.restart_pending = false;
            slot.load_time = Some(start.elapsed());
        }

        self.invoke(module.as_ref(), Hook::Attach);
        info!(
            "Attached extension {} in {:?}",
            self.name,
            start.elapsed()
        );
        true
    }

    /// Attach and run the ready hook, regardless of hot-reload support
    pub fn attach_ready(&self, loader: &dyn ModuleLoader) -> bool {
        if self.attach(loader) {
            self.call_hook(Hook::Ready);
            true
        } else {
            false
        }
    }

    /// Attach without a restart, only if the extension supports it
    pub fn hot_attach(&self, loader: &dyn ModuleLoader) -> bool {
        self.is_hot() && self.attach_ready(loader)
    }

    /// Run the detach hook and unload the module
    pub fn detach(&self) -> bool {
        let module = {
            let slot = self.slot.lock();
            if !slot.loaded {
                return false;
            }
            slot.module.clone()
        };

        if let Some(module) = module {
            if !self.is_disabled() {
                self.invoke(module.as_ref(), Hook::Detach);
            }
        }

        let mut slot = self.slot.lock();
        slot.module = None;
        slot.loaded = false;
        slot.load_time = None;
        info!("Detached extension {}", self.name);
        true
    }

    /// Call a hook on the loaded module
    ///
    /// Disabled extensions never run module code. Returns whether the hook
    /// ran without error.
    pub fn call_hook(&self, hook: Hook) -> bool {
        if self.is_disabled() {
            return false;
        }
        let module = self.slot.lock().module.clone();
        match module {
            Some(module) => self.invoke(module.as_ref(), hook),
            None => false,
        }
    }

    fn invoke(&self, module: &dyn ExtensionModule, hook: Hook) -> bool {
        let result = match hook {
            Hook::Attach => module.on_attach(self),
            Hook::Ready => module.on_ready(self),
            Hook::Detach => module.on_detach(self),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Extension {} {} failed: {:#}", self.name, hook.as_str(), e);
                false
            }
        }
    }

    // Persistence

    /// Storable projection: manifest plus non-transient runtime data
    pub fn record(&self) -> ExtensionRecord {
        ExtensionRecord {
            pkg: self.pkg.clone(),
            data: self.data.read().persistent(),
        }
    }

    /// Stamp a fresh install
    pub(crate) fn mark_installed(&self) {
        self.set_install_time(now_millis());
    }

    /// Score against parsed search keys
    pub fn match_score(&self, keys: &[String]) -> u32 {
        match_score(EXTENSION_MATCH_RULES, self, keys)
    }
}

impl Matchable for Extension {
    fn match_field(&self, field: &str) -> Option<FieldValue> {
        match field {
            "name" => Some(self.name().into()),
            "displayName" => Some(self.display_name().into()),
            "pinyinNames" => Some(self.pinyin_names().to_vec().into()),
            "description" => self.description().map(Into::into),
            "keywords" => Some(self.keywords().to_vec().into()),
            "type" => Some(self.kind.as_str().into()),
            "author" => self.author().map(Into::into),
            "publisher" => self.publisher().map(Into::into),
            "homepage" => self.homepage().map(Into::into),
            _ => None,
        }
    }
}
