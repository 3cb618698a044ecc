//! Extension lifecycle management for xext
//!
//! This crate handles:
//! - The extension model (apps, themes and plugins) and its validation
//! - Weighted search over extensions and themes
//! - The persistent registry of installed extensions
//! - Installing packages from archives and directories
//! - Syncing server-pushed remote extensions
//! - The in-memory collection, enable/disable and module attachment
//! - Theme selection

pub mod archive;
pub mod builtin;
pub mod confirm;
pub mod events;
pub mod extension;
pub mod fs;
pub mod installer;
pub mod lifecycle;
pub mod net;
pub mod pinyin;
pub mod registry;
pub mod remote;
pub mod search;
pub mod themes;
pub mod transport;

pub use confirm::{AutoConfirm, Confirmation, Prompt};
pub use events::{ChangeAction, ChangeListener, ExtensionChange};
pub use extension::{
    Extension, ExtensionKind, ExtensionModule, ModuleLoader, SharedExtension, StaticModuleLoader,
    Theme, ThemeId,
};
pub use fs::{FileSystem, LocalFileSystem};
pub use installer::{ExtensionInstaller, InstallOutcome, InstallSource, InstallStage};
pub use lifecycle::LifecycleController;
pub use net::{Downloader, HttpDownloader};
pub use registry::ExtensionDatabase;
pub use remote::{RemoteSession, RemoteSyncEngine, ServerExtension};
pub use themes::{ThemeManager, ThemeStyle};
pub use transport::{HttpTransport, Transport};
