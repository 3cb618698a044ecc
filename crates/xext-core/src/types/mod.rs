//! Type definitions shared by the xext crates

mod config_types;
mod manifest;
mod runtime;

pub use config_types::*;
pub use manifest::*;
pub use runtime::*;
