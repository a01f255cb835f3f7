//! Fixed-count retries with linear backoff.
//!
//! Every strategy wraps its network calls in [`RetryFetch`], a decorator over
//! any [`FetchAsync`] implementation. The decorator gives up early when an
//! error is not retryable (see [`FetchError::is_retryable`]), so a payload
//! that parsed but failed validation is never re-requested.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay(after failed attempt n) = base_delay + step * (n - 1) + random_jitter(0..=jitter)
//! ```

use crate::config::Pacing;
use crate::http::FetchError;
use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// A single fallible fetch. `attempt` is 1-based.
pub trait FetchAsync {
    type Output;

    async fn fetch(&self, attempt: usize) -> Result<Self::Output, FetchError>;
}

/// Adapter turning a closure into a [`FetchAsync`].
pub struct FnFetch<F>(pub F);

impl<F, Fut, T> FetchAsync for FnFetch<F>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    type Output = T;

    async fn fetch(&self, attempt: usize) -> Result<T, FetchError> {
        (self.0)(attempt).await
    }
}

/// Decorator adding fixed-count retries with linear backoff.
pub struct RetryFetch<T> {
    inner: T,
    label: String,
    max_attempts: usize,
    base_delay: Duration,
    step: Duration,
    jitter_ms: u64,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    /// Wrap `inner`; without further configuration retries happen back to back.
    pub fn new(inner: T, label: impl Into<String>, max_attempts: usize) -> Self {
        Self {
            inner,
            label: label.into(),
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            step: Duration::ZERO,
            jitter_ms: 0,
        }
    }

    /// Wrap `inner` using the configured retry delay, step, and jitter.
    pub fn paced(inner: T, label: impl Into<String>, max_attempts: usize, pacing: &Pacing) -> Self {
        Self::new(inner, label, max_attempts)
            .with_backoff(pacing.retry_delay(), pacing.retry_step())
            .with_jitter(pacing.jitter_ms)
    }

    pub fn with_backoff(mut self, base_delay: Duration, step: Duration) -> Self {
        self.base_delay = base_delay;
        self.step = step;
        self
    }

    pub fn with_jitter(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    /// Delay to wait after the failed attempt `attempt` (1-based), without jitter.
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_add(self.step.saturating_mul(factor))
    }

    #[instrument(level = "debug", skip_all, fields(label = %self.label))]
    pub async fn run(&self) -> Result<T::Output, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let err = match self.inner.fetch(attempt).await {
                Ok(out) => return Ok(out),
                Err(e) => e,
            };

            let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
            let elapsed_ms_total = total_t0.elapsed().as_millis();

            if !err.is_retryable() {
                error!(
                    label = %self.label,
                    attempt,
                    elapsed_ms_total,
                    error = %err,
                    "Non-retryable failure; giving up"
                );
                return Err(err);
            }

            if attempt >= self.max_attempts {
                error!(
                    label = %self.label,
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_attempt,
                    elapsed_ms_total,
                    error = %err,
                    "Exhausted retries"
                );
                return Err(err);
            }

            let jitter = if self.jitter_ms > 0 {
                Duration::from_millis(rng().random_range(0..=self.jitter_ms))
            } else {
                Duration::ZERO
            };
            let delay = self.delay_after(attempt) + jitter;

            warn!(
                label = %self.label,
                attempt,
                max = self.max_attempts,
                elapsed_ms_attempt,
                elapsed_ms_total,
                ?delay,
                error = %err,
                "Attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("label", &self.label)
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("step", &self.step)
            .field("jitter_ms", &self.jitter_ms)
            .finish()
    }
}
