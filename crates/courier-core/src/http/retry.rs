//! Retry logic with exponential backoff
//!
//! Only transient failures are retried: timeouts, connection faults, 408,
//! 429 and 5xx. A 401 never reaches this layer as retryable; it belongs to
//! the auth interceptor.

use backoff::{backoff::Backoff, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ApiError;
use super::timeout::cancellable_sleep;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to randomize delays
    pub jitter: bool,
    /// Wait for the server's `Retry-After` instead of the computed delay
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
            respect_retry_after: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom settings
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// Create an exponential backoff instance
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier,
            max_elapsed_time: None, // bounded by max_retries instead
            ..Default::default()
        };

        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }

        backoff
    }

    /// Total time spent waiting if every retry is used (without jitter)
    pub fn total_delay(&self) -> Duration {
        let mut backoff = self.create_backoff();
        (0..self.max_retries)
            .filter_map(|_| backoff.next_backoff())
            .sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.multiplier < 1.0 {
            return Err("Backoff multiplier must be >= 1.0".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("Max delay should be >= base delay".to_string());
        }
        Ok(())
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Per-call retry bookkeeping
#[derive(Debug)]
pub struct RetryHandler {
    policy: RetryPolicy,
    retries: u32,
    backoff: ExponentialBackoff,
}

impl RetryHandler {
    /// Create a new retry handler with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            retries: 0,
            backoff,
        }
    }

    /// Determine if a request should be retried based on the error
    pub fn should_retry(&mut self, error: &ApiError) -> RetryDecision {
        if self.retries >= self.policy.max_retries {
            return RetryDecision::NoRetry;
        }

        if !error.is_retryable() {
            return RetryDecision::NoRetry;
        }

        self.retries += 1;

        RetryDecision::Retry {
            delay: self.next_delay(error),
        }
    }

    fn next_delay(&mut self, error: &ApiError) -> Duration {
        let computed = self.backoff.next_backoff().unwrap_or(self.policy.max_delay);

        match error.retry_after {
            Some(secs) if self.policy.respect_retry_after => {
                Duration::from_secs(secs).min(self.policy.max_delay)
            }
            _ => computed,
        }
    }

    /// Reset the retry handler for a new request
    pub fn reset(&mut self) {
        self.retries = 0;
        self.backoff.reset();
    }

    /// Number of retries granted so far
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

/// Run `operation` until it succeeds, fails terminally, or retries run out
///
/// Backoff waits observe `cancel`, so a cancelled call never issues another
/// attempt. The last error is returned as-is.
pub async fn execute_with_retry<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut handler = RetryHandler::new(policy.clone());

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match handler.should_retry(&error) {
            RetryDecision::Retry { delay } => {
                warn!(
                    retry = handler.retries(),
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    kind = %error.kind,
                    "Request failed, retrying: {}",
                    error.message
                );
                cancellable_sleep(delay, cancel).await?;
            }
            RetryDecision::NoRetry => {
                debug!(
                    retries = handler.retries(),
                    kind = %error.kind,
                    "Request failed, not retrying"
                );
                return Err(error);
            }
        }
    }
}
