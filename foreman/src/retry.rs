//! Resilient model client: throttling plus bounded retry with backoff.
//!
//! [`ResilientClient`] wraps any [`Model`]. Every attempt first passes the
//! shared [`Throttle`]; transient failures (rate limiting, server errors,
//! network failures) are retried with exponential backoff until the attempt
//! budget is spent, while permanent failures surface immediately. The
//! client never touches conversation history.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::providers::{Model, ModelRequest, ModelResponse};
use crate::throttle::Throttle;

/// Configuration for retrying failed requests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds.
    pub initial_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to retry delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Calculate the delay after a failed attempt (0-indexed).
    ///
    /// Jitter adds at most 25%, so delays stay strictly increasing for any
    /// multiplier of 2 or more.
    #[must_use]
    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = if self.jitter {
            base_delay + base_delay * 0.25 * rand_factor()
        } else {
            base_delay
        };
        Duration::from_millis(delay_ms as u64)
    }

    /// Attempt budget, never below one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }
}

/// Generate a pseudo-random factor between 0.0 and 1.0.
fn rand_factor() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// A model client that throttles and retries.
#[derive(Debug)]
pub struct ResilientClient<M> {
    model: M,
    throttle: Arc<Throttle>,
    retry: RetryConfig,
}

impl<M: Model> ResilientClient<M> {
    /// Wrap a model with the given throttle and retry policy.
    pub const fn new(model: M, throttle: Arc<Throttle>, retry: RetryConfig) -> Self {
        Self {
            model,
            throttle,
            retry,
        }
    }

    /// The wrapped model.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// The shared throttle.
    pub const fn throttle(&self) -> &Arc<Throttle> {
        &self.throttle
    }

    /// Perform one logical call.
    ///
    /// # Errors
    ///
    /// Returns the last [`LlmError`] once retries are exhausted, or the
    /// first non-transient error immediately.
    pub async fn call(&self, request: &ModelRequest) -> Result<ModelResponse, LlmError> {
        let attempts = self.retry.attempts();
        let mut attempt = 0;
        loop {
            self.throttle.acquire().await;
            match self.model.generate(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(attempt = attempt + 1, "model call recovered after retry");
                    }
                    return Ok(response);
                }
                Err(err) if err.is_retryable() && attempt + 1 < attempts => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        kind = ?err.kind,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "transient model failure, backing off"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        kind = ?err.kind,
                        attempts = attempt + 1,
                        retryable = err.is_retryable(),
                        error = %err,
                        "model call failed"
                    );
                    return Err(err);
                }
            }
        }
    }
}
