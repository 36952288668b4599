//! Test helper functions for riftwatch-core

use riftwatch_core::infrastructure::rate_limiter::find_violation;
use riftwatch_core::{Permit, Quota, RateLimiter};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Spawn `callers` tasks that each acquire one permit, returning `(caller, permit)` pairs
/// sorted by grant time
pub async fn acquire_burst(limiter: &RateLimiter, callers: usize) -> Vec<(usize, Permit)> {
    let mut tasks = JoinSet::new();
    for caller in 0..callers {
        let limiter = limiter.clone();
        tasks.spawn(async move { (caller, limiter.acquire().await) });
    }

    let mut grants = Vec::with_capacity(callers);
    while let Some(joined) = tasks.join_next().await {
        grants.push(joined.expect("Caller task panicked"));
    }
    grants.sort_by_key(|(_, permit)| permit.granted_at());
    grants
}

/// Offset of each grant from `start`, in grant order
pub fn offsets(start: Instant, grants: &[(usize, Permit)]) -> Vec<Duration> {
    grants
        .iter()
        .map(|(_, permit)| permit.granted_at().duration_since(start))
        .collect()
}

/// Assert no trailing window of any quota holds more grants than allowed
pub fn assert_within_quotas(quotas: &[Quota], grants: &[Instant]) {
    if let Some(violation) = find_violation(quotas, grants) {
        panic!("Grant log violates quotas: {}", violation);
    }
}

/// Assert `actual` lies in `[expected, expected + tolerance]`
pub fn assert_at(actual: Duration, expected: Duration, tolerance: Duration) {
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected {:?} within +{:?}, got {:?}",
        expected,
        tolerance,
        actual
    );
}

/// Create a temporary directory for testing
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Write a config file with the given name and content
pub fn write_config(dir: &TempDir, filename: &str, content: &str) -> PathBuf {
    let path = dir.path().join(filename);
    std::fs::write(&path, content).expect("Failed to write config file");
    path
}
