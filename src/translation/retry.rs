/*!
 * Retry with exponential backoff for backend calls.
 *
 * A call is attempted at most `1 + max_retries` times. Before retry `n`
 * (0-based) the caller sleeps `backoff_multiplier^n` seconds, capped at the
 * request timeout. Only transient failures are retried. A rate limiter
 * permit is taken before every attempt, retries included.
 */

use log::{debug, warn};
use std::time::Duration;

use super::rate_limiter::RateLimiter;
use crate::app_config::RetryConfig;
use crate::errors::BackendError;
use crate::providers::TranslationBackend;

/// Retry policy for a backend call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_multiplier: f64,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_multiplier: config.backoff_multiplier,
            request_timeout: Duration::from_secs(config.request_timeout),
        }
    }

    /// Total number of attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Sleep before retry `retry` (0-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let secs = self.backoff_multiplier.powi(retry as i32);
        let cap = self.request_timeout.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            self.request_timeout
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }
}

/// Result of a call with retries and the number of attempts it took
#[derive(Debug)]
pub struct Attempted<T> {
    pub outcome: Result<T, BackendError>,
    pub attempts: u32,
}

/// Translate `text` on `backend`, retrying transient failures
pub async fn translate_with_retry(
    backend: &dyn TranslationBackend,
    text: &str,
    limiter: &RateLimiter,
    policy: &RetryPolicy,
) -> Attempted<String> {
    let backend_id = backend.id();
    let mut attempts = 0;

    loop {
        limiter.acquire(backend_id).await;
        attempts += 1;
        debug!("Calling {} (attempt {}/{})", backend_id, attempts, policy.max_attempts());

        let outcome = match tokio::time::timeout(policy.request_timeout, backend.translate(text)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(BackendError::Timeout(format!(
                "no response from {} within {}s",
                backend_id,
                policy.request_timeout.as_secs()
            ))),
        };

        match outcome {
            Ok(text) => {
                return Attempted {
                    outcome: Ok(text),
                    attempts,
                };
            }
            Err(error) if error.is_retryable() && attempts < policy.max_attempts() => {
                let backoff = policy.backoff_for(attempts - 1);
                warn!(
                    "{} call failed ({}) - attempt {}/{}, retrying in {:.1}s",
                    backend_id,
                    error,
                    attempts,
                    policy.max_attempts(),
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
            }
            Err(error) => {
                return Attempted {
                    outcome: Err(error),
                    attempts,
                };
            }
        }
    }
}
