//! Bounded retry of a single remote operation
//!
//! Remote operations return a classified [`Error`]: transient failures are
//! retried after a fixed delay, anything else is returned at once. When the
//! budget runs out, the most recent underlying error is returned, never a
//! synthetic "retries exhausted" error.
//!
//! ## Budgets
//!
//! A [`RetryPolicy`] bounds the loop in up to three ways, whichever trips
//! first:
//!
//! - `max_attempts`: number of invocations of the operation
//! - `deadline`: overall wall-clock ceiling, honoured mid-attempt and mid-delay
//! - `attempt_timeout`: limit on a single invocation (a timed-out invocation
//!   counts as a transient failure)
//!
//! Attempts run strictly one after another. There is no jitter.

use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout, timeout_at};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Delay between attempts of the standard policy
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Wall-clock ceiling of the standard policy
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(2 * 60 * 60);

/// Clone identity polling: wait between searches
pub const CLONE_POLL_DELAY: Duration = Duration::from_secs(60);

/// Clone identity polling: limit on one search call
pub const CLONE_POLL_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

/// Clone identity polling: number of searches
pub const CLONE_POLL_ATTEMPTS: u32 = 10;

/// Outcome of one attempt, as decided by the caller's classifier
#[derive(Debug)]
pub enum Attempt<T> {
    /// Finished successfully
    Done(T),
    /// Failed, another attempt may succeed
    Retry(Error),
    /// Failed for good
    Fail(Error),
}

impl<T> Attempt<T> {
    /// Classify a plain result with [`Error::is_transient`]
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(e) if e.is_transient() => Attempt::Retry(e),
            Err(e) => Attempt::Fail(e),
        }
    }
}

/// Immutable retry budget selected per call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Wait between a failed attempt and the next one
    pub delay: Duration,
    /// Limit on a single invocation of the operation
    pub attempt_timeout: Option<Duration>,
    /// Maximum number of invocations
    pub max_attempts: Option<u32>,
    /// Overall wall-clock ceiling
    pub deadline: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// Policy for ordinary calls: fixed delay until the two hour ceiling
    pub fn standard() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            attempt_timeout: None,
            max_attempts: None,
            deadline: Some(DEFAULT_RETRY_TIMEOUT),
        }
    }

    /// Small fixed budget, for polling a just-created object
    pub fn custom(delay: Duration, attempt_timeout: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            attempt_timeout: Some(attempt_timeout),
            max_attempts: Some(max_attempts),
            deadline: None,
        }
    }

    /// Policy used to find an instance after an asynchronous clone
    pub fn clone_poll() -> Self {
        Self::custom(
            CLONE_POLL_DELAY,
            CLONE_POLL_ATTEMPT_TIMEOUT,
            CLONE_POLL_ATTEMPTS,
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Whether the policy can ever stop retrying a transient failure
    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some() || self.deadline.is_some()
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs out
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_classified(|| {
            let fut = op();
            async move { Attempt::from_result(fut.await) }
        })
        .await
    }

    /// The retry loop itself. `op` decides per attempt whether to stop,
    /// retry or fail.
    pub async fn run_classified<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let deadline = self.deadline.map(|ceiling| Instant::now() + ceiling);
        let mut attempt: u32 = 0;
        let mut last_error: Option<Error> = None;

        loop {
            if attempt > 0 && deadline.is_some_and(|at| Instant::now() >= at) {
                break;
            }
            attempt += 1;

            let Some(outcome) = until(deadline, self.bounded_attempt(attempt, op())).await else {
                debug!("Retry ceiling reached during attempt {}", attempt);
                break;
            };

            match outcome {
                Attempt::Done(value) => {
                    if attempt > 1 {
                        debug!("Remote call succeeded on attempt {}", attempt);
                    }
                    return Ok(value);
                }
                Attempt::Fail(e) => {
                    debug!("Attempt {} failed with terminal error: {}", attempt, e);
                    return Err(e);
                }
                Attempt::Retry(e) => {
                    warn!("Attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }

            if self.max_attempts.is_some_and(|max| attempt >= max) {
                break;
            }

            if until(deadline, sleep(self.delay)).await.is_none() {
                debug!("Retry ceiling reached while waiting after attempt {}", attempt);
                break;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::transient(format!(
                "no attempt completed within {:?}",
                self.deadline.unwrap_or_default()
            ))
        }))
    }

    async fn bounded_attempt<T, Fut>(&self, attempt: u32, fut: Fut) -> Attempt<T>
    where
        Fut: Future<Output = Attempt<T>>,
    {
        match self.attempt_timeout {
            Some(limit) => timeout(limit, fut).await.unwrap_or_else(|_| {
                Attempt::Retry(Error::transient(format!(
                    "attempt {} timed out after {:?}",
                    attempt, limit
                )))
            }),
            None => fut.await,
        }
    }
}

/// Run `op` under [`RetryPolicy::standard`]
pub async fn retry<T, F, Fut>(op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    RetryPolicy::standard().run(op).await
}

async fn until<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}
