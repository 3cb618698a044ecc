//! Common test utilities for xext-extensions
//!
//! This module provides shared test infrastructure including:
//! - Constants and configuration
//! - Manifest builders for creating test packages
//! - A temporary host wiring the registry, installer and controller
//! - Mock collaborators for downloads, transport, prompts and modules
//! - Assertion helpers

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod builders;
pub mod constants;
pub mod fixtures;
pub mod mocks;

pub use assertions::*;
pub use builders::*;
pub use constants::*;
pub use fixtures::*;
pub use mocks::*;
