//! Assertion helpers for extension tests

#![allow(dead_code)]

use xext_core::Error;
use xext_extensions::{Extension, SharedExtension};

/// Assert the extension recorded exactly these issue fields, in order
pub fn assert_issue_fields(ext: &Extension, expected: &[&str]) {
    let fields: Vec<String> = ext.issues().into_iter().map(|issue| issue.field).collect();
    assert_eq!(
        fields, expected,
        "Unexpected validation issues on extension '{}'",
        ext.name()
    );
}

/// Assert an operation failed with the given error code
pub fn assert_error_code<T: std::fmt::Debug>(result: Result<T, Error>, code: &str) {
    match result {
        Ok(value) => panic!("Expected {} but the operation succeeded: {:?}", code, value),
        Err(e) => assert_eq!(e.code(), code, "Unexpected error: {}", e),
    }
}

/// Names of a list of extensions
pub fn names(extensions: &[SharedExtension]) -> Vec<String> {
    extensions.iter().map(|ext| ext.name().to_string()).collect()
}

/// Assert a list holds exactly these extension names, in order
pub fn assert_names(extensions: &[SharedExtension], expected: &[&str]) {
    assert_eq!(names(extensions), expected);
}
