//! Test constants for xext-extensions tests

#![allow(dead_code)]

use std::time::Duration;

/// Default timeout for async test operations
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default test extension name
pub const TEST_EXTENSION_NAME: &str = "test-extension";

/// Default test extension version
pub const TEST_EXTENSION_VERSION: &str = "1.0.0";

/// Account used for remote sessions
pub const TEST_ACCOUNT: &str = "alice";

/// Base URL of mocked package downloads
pub const TEST_DOWNLOAD_BASE: &str = "https://packages.test";

/// Base URL returned by the mocked entry visit endpoint
pub const TEST_VISIT_BASE: &str = "https://sso.test/visit";
