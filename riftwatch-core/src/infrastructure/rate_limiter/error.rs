//! Rate limiter error types

use std::time::Duration;

/// Errors surfaced by the rate limiter
///
/// The plain [`acquire`](super::RateLimiter::acquire) call never fails; these
/// come from construction, the deadline and cancellation variants, and the
/// non-blocking [`try_acquire`](super::RateLimiter::try_acquire).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    #[error("Invalid rate limit configuration: {message}")]
    InvalidQuota { message: String },

    #[error("Timed out after {waited:?} waiting for a rate limit permit")]
    Timeout { waited: Duration },

    #[error("Permit acquisition was cancelled")]
    Cancelled,

    #[error("No permit available, retry after {retry_after:?}")]
    Exhausted { retry_after: Duration },
}

impl RateLimitError {
    pub fn invalid_quota(message: impl Into<String>) -> Self {
        Self::InvalidQuota {
            message: message.into(),
        }
    }

    /// Suggested wait before asking again, when one is known
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateLimitError::Exhausted { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether asking again later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RateLimitError::Timeout { .. } | RateLimitError::Exhausted { .. }
        )
    }
}
