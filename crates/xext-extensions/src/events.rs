//! Collection change notifications

use std::fmt;

use crate::extension::SharedExtension;

/// Kind of change applied to a set of extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Add,
    Update,
    Remove,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Remove => "remove",
        })
    }
}

/// Receives add, update and remove notifications
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, extensions: &[SharedExtension], action: ChangeAction);
}

/// Change broadcast to subscribers of the lifecycle controller
#[derive(Debug, Clone)]
pub struct ExtensionChange {
    pub action: ChangeAction,
    pub extensions: Vec<SharedExtension>,
}

impl ExtensionChange {
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }
}
