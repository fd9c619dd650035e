//! Bounded retry with backoff and rate-limit handling
//!
//! One [`RetryState`] lives for a single logical call (one ticket fetch, one
//! model call) and is never shared. Each attempt reports how it failed:
//!
//! - `RateLimited`: the upstream asked us to slow down (HTTP 429)
//! - `Transient`: network error, non-2xx, malformed body
//! - `Fatal`: retrying cannot help, returned at once without another attempt
//!
//! Rate-limit and transient retries draw from the same `max_attempts`
//! budget. When it runs out the call fails with [`RetryError::Exhausted`],
//! whose message contains `after N attempts`.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Self-tuning inter-call delay shared by everything talking to one upstream.
#[derive(Debug, Clone)]
pub struct Throttle {
    delay_ms: Arc<AtomicU64>,
    increment_ms: u64,
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`
pub fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Throttle {
    pub fn new(delay: Duration, increment: Duration) -> Self {
        Self {
            delay_ms: Arc::new(AtomicU64::new(millis(delay))),
            increment_ms: millis(increment),
        }
    }

    pub fn current(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::Relaxed))
    }

    /// Raise the delay by one increment and return the new value
    pub fn bump(&self) -> Duration {
        let increment = self.increment_ms;
        let previous = self
            .delay_ms
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |ms| {
                Some(ms.saturating_add(increment))
            })
            .unwrap_or_else(|ms| ms);
        Duration::from_millis(previous.saturating_add(increment))
    }
}

/// How long to wait before the next attempt
#[derive(Debug, Clone)]
pub enum Backoff {
    Fixed(Duration),
    /// Starts at `initial` and doubles after every wait
    Exponential { initial: Duration },
    /// Reads the throttle's current value at every wait
    Throttled(Throttle),
}

impl Backoff {
    fn initial(&self) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { initial } => *initial,
            Backoff::Throttled(throttle) => throttle.current(),
        }
    }

    /// Delay to use now, given the delay used last time
    fn advance(&self, current: Duration) -> (Duration, Duration) {
        match self {
            Backoff::Fixed(d) => (*d, *d),
            Backoff::Exponential { .. } => (current, current.saturating_mul(2)),
            Backoff::Throttled(throttle) => {
                let now = throttle.current();
                (now, now)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub failure_backoff: Backoff,
    pub rate_limit_backoff: Backoff,
}

/// Counters for one logical call
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempts: u32,
    failure_delay: Duration,
    rate_limit_delay: Duration,
}

impl RetryState {
    fn new(policy: &RetryPolicy) -> Self {
        Self {
            attempts: 0,
            failure_delay: policy.failure_backoff.initial(),
            rate_limit_delay: policy.rate_limit_backoff.initial(),
        }
    }
}

/// How a single attempt failed
#[derive(Debug)]
pub enum AttemptError<E> {
    RateLimited(E),
    Transient(E),
    Fatal(E),
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("{0}")]
    Fatal(E),
}

/// Run `op` until it succeeds, fails fatally, exhausts the attempt budget, or
/// `cancel` fires. `on_rate_limit` is called once per rate-limited attempt,
/// before the cooldown wait.
pub async fn run<T, E, F, Fut, R>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_rate_limit: R,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError<E>>>,
    R: FnMut(&RetryState),
{
    let mut state = RetryState::new(policy);
    let max_attempts = policy.max_attempts.max(1);

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let attempt = state.attempts + 1;
        let (error, delay) = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(AttemptError::Fatal(e)) => return Err(RetryError::Fatal(e)),
            Err(AttemptError::RateLimited(e)) => {
                on_rate_limit(&state);
                let (now, next) = policy.rate_limit_backoff.advance(state.rate_limit_delay);
                state.rate_limit_delay = next;
                warn!(attempt, delay_ms = millis(now), "rate limited: {}", e);
                (e, now)
            }
            Err(AttemptError::Transient(e)) => {
                let (now, next) = policy.failure_backoff.advance(state.failure_delay);
                state.failure_delay = next;
                warn!(attempt, delay_ms = millis(now), "attempt failed: {}", e);
                (e, now)
            }
        };

        state.attempts = attempt;
        if state.attempts >= max_attempts {
            return Err(RetryError::Exhausted {
                attempts: state.attempts,
                last: error.to_string(),
            });
        }

        debug!(attempt, "waiting {:?} before retry", delay);
        if !sleep_or_cancel(cancel, delay).await {
            return Err(RetryError::Cancelled);
        }
    }
}

/// Sleep for `delay` unless `cancel` fires first. Returns false on cancel.
pub async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
