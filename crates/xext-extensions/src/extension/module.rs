//! Extension modules and their optional lifecycle hooks
//!
//! A module is the code an extension contributes to the host. Every hook is
//! optional: the default implementations do nothing, so calling a hook a
//! module does not provide is a no-op.

use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use super::Extension;

/// Lifecycle hooks a module may implement
pub trait ExtensionModule: Send + Sync {
    /// Called right after the module is loaded
    fn on_attach(&self, _extension: &Extension) -> Result<()> {
        Ok(())
    }

    /// Called after a hot attach, once the host is running
    fn on_ready(&self, _extension: &Extension) -> Result<()> {
        Ok(())
    }

    /// Called before the module is unloaded
    fn on_detach(&self, _extension: &Extension) -> Result<()> {
        Ok(())
    }
}

/// Module with no hooks
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyModule;

impl ExtensionModule for EmptyModule {}

/// Hook selector used by [`Extension::call_hook`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Attach,
    Ready,
    Detach,
}

impl Hook {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Attach => "onAttach",
            Self::Ready => "onReady",
            Self::Detach => "onDetach",
        }
    }
}

/// Where a module's code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MainFile {
    /// Statically registered module compiled into the host
    BuiltIn(String),
    /// Entry-point file inside the extension package
    File(PathBuf),
}

/// Resolves an extension's entry point to a loaded module
pub trait ModuleLoader: Send + Sync {
    fn load(&self, extension: &Extension, main: &MainFile) -> Result<Arc<dyn ExtensionModule>>;
}

type ModuleFactory = Arc<dyn Fn() -> Arc<dyn ExtensionModule> + Send + Sync>;

/// Loader backed by modules registered at startup
///
/// Built-in modules are looked up by module name; package entry points are
/// looked up by extension name. Unregistered entry points load as an
/// [`EmptyModule`] so that the extension still attaches.
#[derive(Default)]
pub struct StaticModuleLoader {
    factories: RwLock<HashMap<String, ModuleFactory>>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory under a module or extension name
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ExtensionModule> + Send + Sync + 'static,
    {
        self.factories.write().insert(name.into(), Arc::new(factory));
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.read().contains_key(name)
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, extension: &Extension, main: &MainFile) -> Result<Arc<dyn ExtensionModule>> {
        let key = match main {
            MainFile::BuiltIn(module) => module.as_str(),
            MainFile::File(_) => extension.name(),
        };
        let factory = self.factories.read().get(key).cloned();
        match factory {
            Some(factory) => Ok(factory()),
            None => {
                debug!("No module registered for {}, using empty module", key);
                Ok(Arc::new(EmptyModule))
            }
        }
    }
}
