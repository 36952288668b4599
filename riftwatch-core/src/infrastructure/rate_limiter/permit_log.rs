//! Permit Log
//!
//! Sliding log of granted permits evaluated against every configured quota.
//!
//! Unlike a windowed counter, the log keeps the exact grant instants, so the
//! wait it computes is the precise moment the binding quota frees a slot:
//! the instant the relevant grant ages out of that quota's trailing window,
//! plus a small epsilon so the re-check never lands on the boundary itself.
//!
//! All methods are synchronous; callers serialize access (the service keeps
//! the log behind a mutex) and never hold it across a suspension point.

use super::error::RateLimitError;
use super::types::{MAX_WINDOW, MIN_WINDOW, Quota, QuotaStatus};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on the capacity reserved up front for the log
const MAX_PREALLOCATED: usize = 1024;

/// Outcome of evaluating the log at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A permit fits under every quota
    Ready,
    /// At least one quota is exhausted
    Wait {
        /// Time until the slowest-recovering quota admits a permit
        delay: Duration,
        /// The quota that imposed `delay`
        binding: Quota,
    },
}

impl Admission {
    pub fn is_ready(&self) -> bool {
        matches!(self, Admission::Ready)
    }
}

/// Time-ordered record of granted permits
#[derive(Debug)]
pub struct PermitLog {
    quotas: Vec<Quota>,
    longest_window: Duration,
    epsilon: Duration,
    /// Grant instants, oldest first
    grants: VecDeque<Instant>,
}

impl PermitLog {
    /// Create an empty log for the given quotas
    ///
    /// `epsilon` is added to every computed wait and must lie in the same range
    /// as a quota window.
    pub fn new(quotas: Vec<Quota>, epsilon: Duration) -> Result<Self, RateLimitError> {
        let Some(longest) = quotas.iter().max_by_key(|quota| quota.window()).copied() else {
            return Err(RateLimitError::invalid_quota(
                "at least one quota must be configured",
            ));
        };
        if epsilon < MIN_WINDOW || epsilon > MAX_WINDOW {
            return Err(RateLimitError::invalid_quota(format!(
                "epsilon must be between 1ms and {}ms, got {:?}",
                MAX_WINDOW.as_millis(),
                epsilon
            )));
        }

        // Once pruned, the log never holds more than the longest quota's limit
        let capacity = (longest.max_permits() as usize).min(MAX_PREALLOCATED);

        Ok(Self {
            quotas,
            longest_window: longest.window(),
            epsilon,
            grants: VecDeque::with_capacity(capacity),
        })
    }

    pub fn quotas(&self) -> &[Quota] {
        &self.quotas
    }

    pub fn epsilon(&self) -> Duration {
        self.epsilon
    }

    /// Window of the longest quota; nothing older than this is retained
    pub fn longest_window(&self) -> Duration {
        self.longest_window
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// Oldest grant still held in memory
    pub fn oldest(&self) -> Option<Instant> {
        self.grants.front().copied()
    }

    /// Drop grants that no quota can see any more
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.grants.front() {
            if now.duration_since(oldest) > self.longest_window {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Decide whether a permit fits at `now` without recording anything
    ///
    /// When several quotas are exhausted the longest wait wins.
    pub fn evaluate(&self, now: Instant) -> Admission {
        let mut admission = Admission::Ready;

        for quota in &self.quotas {
            let Some(delay) = self.delay_for(quota, now) else {
                continue;
            };
            match admission {
                Admission::Wait { delay: current, .. } if current >= delay => {}
                _ => {
                    admission = Admission::Wait {
                        delay,
                        binding: *quota,
                    }
                }
            }
        }

        admission
    }

    /// Prune, evaluate and, if the permit fits, record it at `now`
    pub fn try_admit(&mut self, now: Instant) -> Admission {
        self.prune(now);
        let admission = self.evaluate(now);
        if admission.is_ready() {
            self.record(now);
        }
        admission
    }

    /// Append a grant, keeping the log ordered even if `now` lags the newest entry
    pub fn record(&mut self, now: Instant) {
        let at = match self.grants.back() {
            Some(&newest) if newest > now => newest,
            _ => now,
        };
        self.grants.push_back(at);
    }

    /// Per-quota usage at `now`
    pub fn status(&self, now: Instant) -> Vec<QuotaStatus> {
        self.quotas
            .iter()
            .map(|quota| {
                let used = self.in_window(quota, now) as u32;
                QuotaStatus {
                    quota: *quota,
                    used,
                    remaining: quota.max_permits().saturating_sub(used),
                    available_in: self.delay_for(quota, now),
                }
            })
            .collect()
    }

    /// Grants inside the quota's trailing window, counted newest first
    ///
    /// The left edge of the window is inclusive. Counting stops at the quota's
    /// limit since nothing beyond it changes the decision.
    fn in_window(&self, quota: &Quota, now: Instant) -> usize {
        let window = quota.window();
        self.grants
            .iter()
            .rev()
            .take(quota.max_permits() as usize)
            .take_while(|&&granted| now.duration_since(granted) <= window)
            .count()
    }

    /// Wait until `quota` admits one more permit, or `None` if it already does
    fn delay_for(&self, quota: &Quota, now: Instant) -> Option<Duration> {
        let limit = quota.max_permits() as usize;
        if self.in_window(quota, now) < limit {
            return None;
        }

        // The limit-th newest grant is the one that has to leave the window
        let blocking = self.grants[self.grants.len() - limit];
        let frees_at = blocking + quota.window();
        Some(frees_at.saturating_duration_since(now) + self.epsilon)
    }
}
