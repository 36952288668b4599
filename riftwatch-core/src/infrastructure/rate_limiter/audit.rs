//! Post-hoc verification of a grant log against a set of quotas

use super::types::Quota;
use std::fmt;
use tokio::time::Instant;

/// A trailing window that held more grants than its quota allows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaViolation {
    pub quota: Quota,
    /// First grant inside the offending window
    pub window_start: Instant,
    /// Grants observed inside the window
    pub observed: usize,
}

impl fmt::Display for QuotaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "quota {} exceeded: {} grants inside one window",
            self.quota, self.observed
        )
    }
}

/// Find the first window, for any quota, holding more grants than allowed
///
/// `grants` need not be sorted. Windows use the same inclusive edges the
/// limiter enforces: two grants share a window when they are at most
/// `quota.window()` apart.
pub fn find_violation(quotas: &[Quota], grants: &[Instant]) -> Option<QuotaViolation> {
    let mut sorted = grants.to_vec();
    sorted.sort_unstable();

    quotas.iter().find_map(|quota| {
        let limit = quota.max_permits() as usize;
        let mut start = 0;
        for (end, &granted) in sorted.iter().enumerate() {
            while granted.duration_since(sorted[start]) > quota.window() {
                start += 1;
            }
            let observed = end - start + 1;
            if observed > limit {
                return Some(QuotaViolation {
                    quota: *quota,
                    window_start: sorted[start],
                    observed,
                });
            }
        }
        None
    })
}
