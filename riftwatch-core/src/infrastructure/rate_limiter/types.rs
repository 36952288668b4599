//! Rate limiter types and core data structures

use super::error::RateLimitError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Smallest window a quota may use; grants are reasoned about at millisecond granularity
pub const MIN_WINDOW: Duration = Duration::from_millis(1);

/// Longest window a quota may use (30 days); keeps `Instant + window` in range
pub const MAX_WINDOW: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A single rate constraint: at most `max_permits` grants inside any trailing `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quota {
    window: Duration,
    max_permits: u32,
}

impl Quota {
    /// Create a quota, rejecting windows outside [`MIN_WINDOW`]..=[`MAX_WINDOW`] and zero limits
    pub fn new(window: Duration, max_permits: u32) -> Result<Self, RateLimitError> {
        if window < MIN_WINDOW {
            return Err(RateLimitError::invalid_quota(format!(
                "quota window must be at least 1ms, got {:?}",
                window
            )));
        }
        if window > MAX_WINDOW {
            return Err(RateLimitError::invalid_quota(format!(
                "quota window must be at most {}ms, got {:?}",
                MAX_WINDOW.as_millis(),
                window
            )));
        }
        if max_permits == 0 {
            return Err(RateLimitError::invalid_quota(
                "quota max_permits must be greater than 0",
            ));
        }

        Ok(Self {
            window,
            max_permits,
        })
    }

    /// Convenience constructor for a window expressed in milliseconds
    pub fn from_millis(window_ms: u64, max_permits: u32) -> Result<Self, RateLimitError> {
        Self::new(Duration::from_millis(window_ms), max_permits)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_permits(&self) -> u32 {
        self.max_permits
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}ms", self.max_permits, self.window.as_millis())
    }
}

/// How callers that cannot be served immediately are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessPolicy {
    /// Waiters are granted strictly in arrival order
    #[default]
    Fifo,
    /// Every waiter sleeps its own computed delay and re-checks; no ordering guarantee
    Polling,
}

impl FairnessPolicy {
    /// Get the policy name for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            FairnessPolicy::Fifo => "fifo",
            FairnessPolicy::Polling => "polling",
        }
    }
}

impl fmt::Display for FairnessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A granted permit
///
/// The permit has already been recorded against every quota by the time the
/// caller sees it; there is nothing to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    granted_at: Instant,
    waited: Duration,
}

impl Permit {
    pub(crate) fn new(granted_at: Instant, waited: Duration) -> Self {
        Self { granted_at, waited }
    }

    /// Instant at which the permit was recorded in the log
    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }

    /// Time spent waiting between the request and the grant
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Whether the permit was granted without any wait
    pub fn was_immediate(&self) -> bool {
        self.waited.is_zero()
    }
}

/// Usage of one quota at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaStatus {
    pub quota: Quota,
    /// Grants currently inside the trailing window
    pub used: u32,
    /// Grants still available inside the trailing window
    pub remaining: u32,
    /// How long until this quota admits another permit (only set when exhausted)
    pub available_in: Option<Duration>,
}

/// Snapshot of the whole limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub quotas: Vec<QuotaStatus>,
    /// Callers currently suspended waiting for a permit
    pub waiters: usize,
    /// Grant timestamps currently held in memory
    pub retained: usize,
}

impl RateLimitStatus {
    /// Permits that could be granted right now without waiting
    pub fn remaining(&self) -> u32 {
        self.quotas
            .iter()
            .map(|status| status.remaining)
            .min()
            .unwrap_or(0)
    }

    /// Longest wait imposed by any exhausted quota
    pub fn available_in(&self) -> Option<Duration> {
        self.quotas
            .iter()
            .filter_map(|status| status.available_in)
            .max()
    }

    /// Whether at least one quota is exhausted
    pub fn is_saturated(&self) -> bool {
        self.available_in().is_some()
    }
}
