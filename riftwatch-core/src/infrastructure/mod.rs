//! Infrastructure Layer - External concerns and implementations
//!
//! This module gates access to external, rate-limited APIs.

pub mod rate_limiter;

pub use rate_limiter::{RateLimitError, RateLimiter};
