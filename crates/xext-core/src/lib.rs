//! # xext-core
//!
//! Core library for the xext extension host providing:
//! - Error taxonomy with stable pipeline codes
//! - Hierarchical configuration loading
//! - Package manifest and runtime data types
//! - Persistent key-value storage

pub mod config;
pub mod error;
pub mod store;
pub mod types;
pub mod utils;

pub use config::{ConfigLoader, XextPaths};
pub use error::{Error, Result};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
pub use utils::get_home_dir;
