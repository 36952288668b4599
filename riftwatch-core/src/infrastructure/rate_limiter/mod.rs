//! Rate Limiting Infrastructure
//!
//! Admission control for outbound calls to a third-party API that enforces
//! several simultaneous quotas (for example 9 requests per second and 100
//! requests per two minutes):
//! - Sliding log of grant instants evaluated against every quota
//! - Async waiting with the lock released, FIFO or polling order
//! - Deadline and cancellation aware acquisition
//! - In-memory, single-process state

pub mod audit;
pub mod error;
pub mod permit_log;
pub mod service;
pub mod types;

pub use audit::{QuotaViolation, find_violation};
pub use error::RateLimitError;
pub use permit_log::{Admission, PermitLog};
pub use service::{DEFAULT_EPSILON, RateLimiter};
pub use types::{
    FairnessPolicy, MAX_WINDOW, MIN_WINDOW, Permit, Quota, QuotaStatus, RateLimitStatus,
};
