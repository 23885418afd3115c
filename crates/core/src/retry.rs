//! Exponential backoff for throttled collaborator calls.
//!
//! Throttling is recognised from the failure message alone, so any error type
//! with a `Display` impl can be wrapped. Failed attempts are not rolled back;
//! only idempotent reads and overwrite-style writes go through here.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::RetryError;
use crate::pacing::{Sleeper, TokioSleeper};

/// Lower-cased substrings that mark a failure as throttling.
pub const RATE_LIMIT_MARKERS: [&str; 5] =
    ["quota", "rate limit", "429", "too many requests", "exceeded"];

#[must_use]
pub fn is_rate_limit_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m))
}

#[derive(Clone)]
pub struct RateLimitHandler {
    policy: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RateLimitHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitHandler")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimitHandler {
    fn default() -> Self {
        Self::new(RetryConfig::default(), Arc::new(TokioSleeper))
    }
}

impl RateLimitHandler {
    #[must_use]
    pub fn new(policy: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    /// Runs `op`, retrying throttled failures up to `max_retries` times.
    ///
    /// At most `max_retries + 1` attempts are made. Each retry sleeps
    /// `delay × U(0.8, 1.2)` and then grows `delay` by the configured
    /// multiplier, capped at the maximum delay.
    ///
    /// # Errors
    ///
    /// [`RetryError::Permanent`] for a non-throttling failure,
    /// [`RetryError::Exhausted`] when throttling outlasts the ceiling.
    pub async fn retry_with_backoff<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let max_retries = self.policy.max_retries;
        let max_delay = self.policy.max_delay();
        let mut delay = self.policy.base_delay();
        let mut retries = 0u32;

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_rate_limit_message(&err.to_string()) {
                return Err(RetryError::Permanent(err));
            }
            if retries >= max_retries {
                warn!(attempts = retries + 1, error = %err, "Rate limit persisted, giving up");
                return Err(RetryError::Exhausted {
                    retries: max_retries,
                    attempts: retries + 1,
                    last: err,
                });
            }

            retries += 1;
            let factor = rand::thread_rng().gen_range(0.8..=1.2);
            let actual = delay.mul_f64(factor);
            if retries == 1 {
                warn!(error = %err, delay_ms = actual.as_millis() as u64, "Rate limited, retrying");
            } else {
                debug!(attempt = retries + 1, delay_ms = actual.as_millis() as u64, "Retrying after backoff");
            }
            self.sleeper.sleep(actual).await;
            delay = next_delay(delay, self.policy.multiplier, max_delay);
        }
    }
}

fn next_delay(delay: Duration, multiplier: f64, max_delay: Duration) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * multiplier)
        .map_or(max_delay, |next| next.min(max_delay))
}
