//! Rate Limiter Service
//!
//! The process-wide admission point for calls to a rate-limited API. One
//! [`RateLimiter`] is built at startup and cloned into every task that talks
//! to the API; clones share the same permit log.
//!
//! Acquisition works in two phases:
//! - a synchronous check-and-record under a mutex, which either grants the
//!   permit or reports how long the binding quota needs to recover;
//! - an asynchronous wait with the mutex released, after which the check runs
//!   again since other callers and the clock have moved on.
//!
//! With [`FairnessPolicy::Fifo`] only the oldest waiter sleeps on the quota
//! timer. Everyone queued behind it parks on a [`Notify`] that fires whenever
//! the head is granted or gives up, so waiters are served in arrival order.
//! [`FairnessPolicy::Polling`] lets every waiter sleep its own delay and race
//! for the next free slot.

use super::error::RateLimitError;
use super::permit_log::{Admission, PermitLog};
use super::types::{FairnessPolicy, Permit, Quota, RateLimitStatus};
use crate::config::RateLimiterConfig;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::{Future, pending};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Buffer added to every computed wait
pub const DEFAULT_EPSILON: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct LimiterState {
    log: PermitLog,
    /// Tickets of queued callers, oldest first (FIFO policy only)
    queue: VecDeque<u64>,
    next_ticket: u64,
    /// Callers currently suspended, under either policy
    waiting: usize,
}

#[derive(Debug)]
struct Shared {
    /// Synchronous lock: `Waiter::drop` must take it, and it is never held across an await
    state: Mutex<LimiterState>,
    /// Signalled when the queue head changes
    turn: Notify,
    quotas: Vec<Quota>,
    fairness: FairnessPolicy,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // Every critical section leaves the state consistent, so a panic elsewhere
        // while holding the lock does not invalidate it
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A caller that could not be served on arrival
///
/// Dropping it, whether after a grant, a timeout, a cancellation or because
/// the acquiring future itself was dropped, removes the caller from the queue
/// and hands the turn to the next waiter.
struct Waiter<'a> {
    shared: &'a Shared,
    ticket: Option<u64>,
    started: Instant,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        let mut state = self.shared.lock();
        state.waiting = state.waiting.saturating_sub(1);

        let Some(ticket) = self.ticket.take() else {
            return;
        };
        let was_head = state.queue.front() == Some(&ticket);
        state.queue.retain(|&queued| queued != ticket);
        drop(state);

        if was_head {
            self.shared.turn.notify_waiters();
        }
    }
}

/// What a waiter should do next
enum Turn {
    Granted(Permit),
    /// Head of the queue (or polling): sleep until the binding quota recovers
    SleepUntil(Instant),
    /// Someone is ahead in the queue
    Queued,
}

/// Multi-window rate limiter shared by every caller of a rate-limited API
///
/// Guarantees that for every configured [`Quota`] no more than
/// `max_permits` permits are granted inside any trailing `window`, across all
/// tasks and threads holding a clone.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    shared: Arc<Shared>,
}

impl RateLimiter {
    /// Create a FIFO limiter with the default epsilon
    pub fn new(quotas: Vec<Quota>) -> Result<Self, RateLimitError> {
        Self::with_options(quotas, DEFAULT_EPSILON, FairnessPolicy::default())
    }

    /// Create a limiter with explicit epsilon and fairness policy
    pub fn with_options(
        quotas: Vec<Quota>,
        epsilon: Duration,
        fairness: FairnessPolicy,
    ) -> Result<Self, RateLimitError> {
        let log = PermitLog::new(quotas.clone(), epsilon)?;

        info!(
            quotas = %describe(&quotas),
            epsilon_ms = epsilon.as_millis() as u64,
            fairness = fairness.as_str(),
            "Rate limiter initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(LimiterState {
                    log,
                    queue: VecDeque::new(),
                    next_ticket: 0,
                    waiting: 0,
                }),
                turn: Notify::new(),
                quotas,
                fairness,
            }),
        })
    }

    /// Create a limiter from the serializable configuration
    pub fn from_config(config: &RateLimiterConfig) -> Result<Self, RateLimitError> {
        Self::with_options(config.to_quotas()?, config.epsilon(), config.fairness)
    }

    pub fn quotas(&self) -> &[Quota] {
        &self.shared.quotas
    }

    pub fn fairness(&self) -> FairnessPolicy {
        self.shared.fairness
    }

    /// Wait for a permit
    ///
    /// Returns as soon as every quota has room. There is no upper bound on the
    /// wait; use [`acquire_timeout`](Self::acquire_timeout) or
    /// [`acquire_cancellable`](Self::acquire_cancellable) when one is needed.
    pub async fn acquire(&self) -> Permit {
        match self.acquire_or(pending::<Infallible>()).await {
            Ok(permit) => permit,
            Err(never) => match never {},
        }
    }

    /// Wait for a permit for at most `timeout`
    ///
    /// A timeout too large to express as a deadline waits without bound.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Permit, RateLimitError> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.acquire_until(deadline).await,
            None => Ok(self.acquire().await),
        }
    }

    /// Wait for a permit until `deadline`
    pub async fn acquire_until(&self, deadline: Instant) -> Result<Permit, RateLimitError> {
        let started = Instant::now();
        self.acquire_or(sleep_until(deadline)).await.map_err(|()| {
            let waited = started.elapsed();
            debug!(
                waited_ms = waited.as_millis() as u64,
                "Gave up waiting for a rate limit permit"
            );
            RateLimitError::Timeout { waited }
        })
    }

    /// Wait for a permit unless `token` is cancelled first
    pub async fn acquire_cancellable(
        &self,
        token: &CancellationToken,
    ) -> Result<Permit, RateLimitError> {
        self.acquire_or(token.cancelled()).await.map_err(|()| {
            debug!("Permit acquisition cancelled");
            RateLimitError::Cancelled
        })
    }

    /// Take a permit only if one is available right now
    ///
    /// Under the FIFO policy a permit is never handed out ahead of queued
    /// callers.
    pub fn try_acquire(&self) -> Result<Permit, RateLimitError> {
        let mut state = self.shared.lock();
        let now = Instant::now();

        if !state.queue.is_empty() {
            state.log.prune(now);
            let retry_after = match state.log.evaluate(now) {
                Admission::Wait { delay, .. } => delay,
                Admission::Ready => state.log.epsilon(),
            };
            return Err(RateLimitError::Exhausted { retry_after });
        }

        match state.log.try_admit(now) {
            Admission::Ready => Ok(Permit::new(now, Duration::ZERO)),
            Admission::Wait { delay, .. } => Err(RateLimitError::Exhausted { retry_after: delay }),
        }
    }

    /// Acquire a permit, then run `operation`
    ///
    /// The operation's outcome is passed through untouched; retrying is left
    /// to the caller.
    pub async fn throttle<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        operation().await
    }

    /// Current usage of every quota
    pub fn status(&self) -> RateLimitStatus {
        let mut state = self.shared.lock();
        let now = Instant::now();
        state.log.prune(now);

        RateLimitStatus {
            quotas: state.log.status(now),
            waiters: state.waiting,
            retained: state.log.len(),
        }
    }

    /// Core acquisition loop, abandoned with `abort`'s output if it completes first
    async fn acquire_or<A>(&self, abort: A) -> Result<Permit, A::Output>
    where
        A: Future,
    {
        let mut waiter = match self.admit_or_enqueue() {
            Ok(permit) => return Ok(permit),
            Err(waiter) => waiter,
        };
        tokio::pin!(abort);

        loop {
            // Registered before the check so a hand-over between the check
            // and the await is not lost
            let notified = self.shared.turn.notified();
            tokio::pin!(notified);

            match self.poll_turn(&mut waiter) {
                Turn::Granted(permit) => return Ok(permit),
                Turn::SleepUntil(wake_at) => {
                    tokio::select! {
                        biased;
                        output = &mut abort => return Err(output),
                        _ = sleep_until(wake_at) => {}
                    }
                }
                Turn::Queued => {
                    tokio::select! {
                        biased;
                        output = &mut abort => return Err(output),
                        _ = &mut notified => {}
                    }
                }
            }
        }
    }

    /// Grant immediately when nobody is waiting and every quota has room,
    /// otherwise register the caller as a waiter
    fn admit_or_enqueue(&self) -> Result<Permit, Waiter<'_>> {
        let mut state = self.shared.lock();
        let now = Instant::now();

        if state.queue.is_empty() && state.log.try_admit(now).is_ready() {
            return Ok(Permit::new(now, Duration::ZERO));
        }

        let ticket = match self.shared.fairness {
            FairnessPolicy::Fifo => {
                let ticket = state.next_ticket;
                state.next_ticket += 1;
                state.queue.push_back(ticket);
                Some(ticket)
            }
            FairnessPolicy::Polling => None,
        };
        state.waiting += 1;

        Err(Waiter {
            shared: &self.shared,
            ticket,
            started: now,
        })
    }

    /// Re-evaluate the quotas on behalf of a waiter
    fn poll_turn(&self, waiter: &mut Waiter<'_>) -> Turn {
        let mut state = self.shared.lock();

        if let Some(ticket) = waiter.ticket
            && state.queue.front() != Some(&ticket)
        {
            return Turn::Queued;
        }

        let now = Instant::now();
        match state.log.try_admit(now) {
            Admission::Ready => {
                let handed_over = waiter.ticket.take().is_some();
                if handed_over {
                    state.queue.pop_front();
                }
                let queued = state.queue.len();
                drop(state);

                if handed_over {
                    self.shared.turn.notify_waiters();
                }

                let waited = now.duration_since(waiter.started);
                trace!(
                    waited_ms = waited.as_millis() as u64,
                    queued = queued,
                    "Permit granted after waiting"
                );
                Turn::Granted(Permit::new(now, waited))
            }
            Admission::Wait { delay, binding } => {
                debug!(
                    delay_ms = delay.as_millis() as u64,
                    window_ms = binding.window().as_millis() as u64,
                    max_permits = binding.max_permits(),
                    waiters = state.waiting,
                    "Rate limit reached, delaying permit"
                );
                Turn::SleepUntil(now + delay)
            }
        }
    }
}

fn describe(quotas: &[Quota]) -> String {
    quotas
        .iter()
        .map(Quota::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_quota(window_ms: u64, max_permits: u32) -> RateLimiter {
        RateLimiter::new(vec![Quota::from_millis(window_ms, max_permits).unwrap()]).unwrap()
    }

    #[test]
    fn test_rejects_empty_quotas() {
        let result = RateLimiter::new(Vec::new());
        assert!(matches!(result, Err(RateLimitError::InvalidQuota { .. })));
    }

    #[test]
    fn test_rejects_zero_epsilon() {
        let result = RateLimiter::with_options(
            vec![Quota::from_millis(1000, 1).unwrap()],
            Duration::ZERO,
            FairnessPolicy::Fifo,
        );
        assert!(matches!(result, Err(RateLimitError::InvalidQuota { .. })));
    }

    #[test]
    fn test_from_default_config() {
        let limiter = RateLimiter::from_config(&RateLimiterConfig::default()).unwrap();
        assert_eq!(limiter.quotas().len(), 2);
        assert_eq!(limiter.fairness(), FairnessPolicy::Fifo);
        assert_eq!(limiter.status().remaining(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_permit_is_immediate() {
        let limiter = single_quota(1000, 2);
        let permit = limiter.acquire().await;
        assert!(permit.was_immediate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_try_acquire_never_waits() {
        let limiter = single_quota(1000, 1);
        assert!(limiter.try_acquire().is_ok());

        let err = limiter.try_acquire().unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_millis(1001)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let limiter = single_quota(1000, 1);
        let clone = limiter.clone();

        limiter.acquire().await;
        assert!(clone.try_acquire().is_err());
        assert_eq!(clone.status().quotas[0].used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_counted_while_suspended() {
        let limiter = single_quota(1000, 1);
        limiter.acquire().await;

        let background = limiter.clone();
        let handle = tokio::spawn(async move { background.acquire().await });
        tokio::task::yield_now().await;
        assert_eq!(limiter.status().waiters, 1);

        handle.await.unwrap();
        assert_eq!(limiter.status().waiters, 0);
    }
}
