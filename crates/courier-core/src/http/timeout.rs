//! Timeout and cancellation for a single network attempt
//!
//! `run_attempt` bounds one attempt by a wall-clock deadline and the
//! caller's cancellation token. Dropping the timer on completion leaves
//! nothing pending behind.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::error::ApiError;

/// Timeout configuration for HTTP requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout - time to establish a connection
    pub connect_timeout: Duration,
    /// Request timeout - total time for one attempt, body included
    pub request_timeout: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl TimeoutConfig {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
        }
    }

    /// Short timeouts for probes and local development
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Long timeouts for exports and uploads
    pub fn slow() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(300), // 5 minutes
        }
    }

    /// Override the request timeout for a specific request
    pub fn with_request_timeout(&self, timeout: Duration) -> Self {
        let mut config = self.clone();
        config.request_timeout = timeout;
        config
    }

    /// Validate timeout configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout cannot be zero".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("Request timeout cannot be zero".to_string());
        }

        if self.request_timeout < self.connect_timeout {
            return Err("Request timeout should be >= connect timeout".to_string());
        }

        Ok(())
    }
}

/// Run one attempt under a deadline and a cancellation token
///
/// Either trigger aborts the attempt. Cancellation is reported as
/// [`ErrorKind::Cancelled`](super::ErrorKind::Cancelled) and wins when
/// both have fired; an expired deadline is reported as a timeout, never
/// as a network fault. When the token is already cancelled or the timeout
/// is zero, `attempt` is dropped without being polled.
pub async fn run_attempt<F, T>(
    attempt: F,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    if cancel.is_cancelled() {
        return Err(ApiError::cancelled());
    }
    if timeout.is_zero() {
        return Err(ApiError::timeout(timeout));
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::cancelled()),
        outcome = tokio::time::timeout(timeout, attempt) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(timeout)),
        },
    }
}

/// Sleep that ends early with a cancellation error
pub async fn cancellable_sleep(delay: Duration, cancel: &CancellationToken) -> Result<(), ApiError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ApiError::cancelled()),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
