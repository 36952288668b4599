//! Quota and limiter fixtures for riftwatch-core

use riftwatch_core::{FairnessPolicy, Quota, RateLimiter};
use std::time::Duration;

/// Epsilon used by every fixture limiter
pub const EPSILON: Duration = Duration::from_millis(1);

/// Quota from a window in milliseconds
pub fn quota(window_ms: u64, max_permits: u32) -> Quota {
    Quota::from_millis(window_ms, max_permits).expect("Invalid test quota")
}

/// The production pair: 9 per second and 100 per two minutes
pub fn riot_quotas() -> Vec<Quota> {
    vec![quota(1_000, 9), quota(120_000, 100)]
}

/// FIFO limiter over the given quotas
pub fn fifo_limiter(quotas: Vec<Quota>) -> RateLimiter {
    RateLimiter::with_options(quotas, EPSILON, FairnessPolicy::Fifo)
        .expect("Failed to build FIFO limiter")
}

/// Polling limiter over the given quotas
pub fn polling_limiter(quotas: Vec<Quota>) -> RateLimiter {
    RateLimiter::with_options(quotas, EPSILON, FairnessPolicy::Polling)
        .expect("Failed to build polling limiter")
}

/// Sample TOML configuration with a custom quota set
pub fn sample_config_toml() -> &'static str {
    r#"[rate_limit]
epsilon_ms = 2
fairness = "polling"

[[rate_limit.quotas]]
window_ms = 500
max_permits = 3

[[rate_limit.quotas]]
window_ms = 10000
max_permits = 20

[logging]
level = "debug"
format = "compact"
"#
}

/// Sample TOML configuration that must fail validation
pub fn invalid_config_toml() -> &'static str {
    r#"[rate_limit]
epsilon_ms = 1

[[rate_limit.quotas]]
window_ms = 1000
max_permits = 0
"#
}
