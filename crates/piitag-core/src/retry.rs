//! Retry with exponential backoff for transient service errors.
//!
//! Every external call (source connectors, the inspection service, the
//! catalog service) goes through [`with_retry`]. The policy is an explicit
//! value built once per run from configuration; errors decide for themselves
//! whether they are transient via [`RetryableError`].
//!
//! Each attempt is bounded by `call_timeout`. A timeout is reported through
//! [`RetryableError::timed_out`] and retried like any other transient error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Backoff and timeout settings for external calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
    /// Random extra delay, as a fraction of the computed delay (0.0 – 1.0).
    pub jitter: f64,
    /// Upper bound for a single attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries `max_attempts` times with millisecond delays.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: 0.0,
            call_timeout: Duration::from_secs(5),
        }
    }

    /// Un-jittered delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.base_delay
            .saturating_mul(1_u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay before retry number `attempt`, honouring a server-provided hint.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let base = self.backoff(attempt);
        let base = hint.map_or(base, |h| base.max(h)).min(self.max_delay);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return base;
        }
        base.mul_f64(jitter.mul_add(random_unit(), 1.0)).min(self.max_delay)
    }
}

/// Errors that know whether retrying may help.
pub trait RetryableError {
    /// Rate limits, 5xx responses, timeouts, and dropped connections.
    fn is_transient(&self) -> bool;

    /// Server-provided minimum wait (e.g. `Retry-After`).
    fn retry_after(&self) -> Option<Duration> {
        None
    }

    /// Build the error reported when an attempt exceeds the call timeout.
    fn timed_out(operation: &'static str, after: Duration) -> Self;
}

/// Why [`with_retry`] gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The error was not transient; no further attempts were made.
    Permanent(E),
    /// Every attempt failed with a transient error.
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    /// The underlying error from the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(e) | Self::Exhausted { last: e, .. } => e,
        }
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Run `call` until it succeeds, fails permanently, or runs out of attempts.
///
/// # Errors
///
/// Returns [`RetryError::Permanent`] on the first non-transient error, or
/// [`RetryError::Exhausted`] once `policy.max_attempts` transient failures
/// have been seen.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let outcome = match tokio::time::timeout(policy.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(operation, policy.call_timeout)),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_transient() => return Err(RetryError::Permanent(error)),
            Err(error) if attempt >= max_attempts => {
                tracing::warn!(operation, attempt, %error, "giving up after transient failures");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }
            Err(error) => {
                let delay = policy.delay_for(attempt, error.retry_after());
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    %error,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Uniform value in `[0, 1)`; falls back to 0.5 if the OS RNG is unavailable.
fn random_unit() -> f64 {
    let mut buf = [0_u8; 8];
    if getrandom::fill(&mut buf).is_err() {
        return 0.5;
    }
    #[allow(clippy::cast_precision_loss)]
    let value = (u64::from_le_bytes(buf) >> 11) as f64 / (1_u64 << 53) as f64;
    value
}
