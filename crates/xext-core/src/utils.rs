//! Shared utility functions for xext crates

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::OnceLock;

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that
/// containerized setups with an overridden HOME behave like shell tools.
pub fn get_home_dir() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir().ok_or_else(|| Error::invalid_config("Could not determine home directory"))
}

/// Current wall-clock time as milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Epoch used to keep generated sequence numbers short
const SEQUENCE_EPOCH_MILLIS: i64 = 1_548_836_950_510;

/// Next value of a process-wide, strictly increasing sequence
///
/// Seeded from the clock so that values differ between runs.
pub fn time_sequence() -> u64 {
    static SEQUENCE: OnceLock<AtomicU64> = OnceLock::new();
    SEQUENCE
        .get_or_init(|| {
            let seed = (now_millis() - SEQUENCE_EPOCH_MILLIS).max(0) / 1000;
            AtomicU64::new(seed as u64)
        })
        .fetch_add(1, AtomicOrdering::SeqCst)
}

/// Compare two version strings
///
/// Uses semver when both sides parse (a leading `v` is ignored), otherwise
/// falls back to comparing dot-separated numeric segments, treating missing
/// segments as zero. Returns `None` when either side is blank.
pub fn compare_versions(left: &str, right: &str) -> Option<Ordering> {
    let left = left.trim().trim_start_matches('v');
    let right = right.trim().trim_start_matches('v');
    if left.is_empty() || right.is_empty() {
        return None;
    }

    if let (Ok(l), Ok(r)) = (Version::parse(left), Version::parse(right)) {
        return Some(l.cmp(&r));
    }

    let segments = |s: &str| -> Vec<u64> {
        s.split(['.', '-', '+'])
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (l, r) = (segments(left), segments(right));
    let len = l.len().max(r.len());
    for i in 0..len {
        let a = l.get(i).copied().unwrap_or(0);
        let b = r.get(i).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            other => return Some(other),
        }
    }
    Some(Ordering::Equal)
}

/// Whether `candidate` is strictly newer than `current`
pub fn is_newer_version(current: &str, candidate: &str) -> bool {
    compare_versions(current, candidate) == Some(Ordering::Less)
}
