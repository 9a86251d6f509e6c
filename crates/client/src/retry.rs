//! Retry logic for HTTP requests
//!
//! This module provides:
//! - Exponential backoff with a capped delay between attempts
//! - A per-attempt timeout
//! - Eligibility rules by HTTP method and response status code

use std::future::Future;
use std::time::Duration;

use fetchkit_core::constants::{DEFAULT_RETRY_LIMIT, DEFAULT_RETRY_STATUS_CODES, DEFAULT_TIMEOUT_MS};
use fetchkit_core::HttpMethod;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::transport::{RawResponse, TransportError};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Number of retries after the first attempt
    pub limit: u32,
    /// Methods that may be retried at all
    pub methods: Vec<HttpMethod>,
    /// Response statuses that trigger a retry
    pub status_codes: Vec<u16>,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Timeout for individual attempts
    pub attempt_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RETRY_LIMIT,
            methods: vec![HttpMethod::Get, HttpMethod::Put, HttpMethod::Delete],
            status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Retry policy applied by the transport around every request
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    retry_config: RetryConfig,
}

impl RetryPolicy {
    /// Create a new retry policy with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new retry policy with custom configuration
    pub fn with_config(retry_config: RetryConfig) -> Self {
        Self { retry_config }
    }

    /// Get retry configuration
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// Total attempts allowed for a method, first attempt included
    pub fn max_attempts(&self, method: HttpMethod) -> u32 {
        if self.retry_config.methods.contains(&method) {
            self.retry_config.limit.saturating_add(1)
        } else {
            1
        }
    }

    /// Check whether a response status warrants another attempt
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_config.status_codes.contains(&status)
    }

    /// Execute a request with timeout and retry handling.
    ///
    /// The last response or failure is returned as-is once attempts run out,
    /// so callers still see the real status of a request that kept failing.
    pub async fn execute<F, Fut>(
        &self,
        method: HttpMethod,
        operation: F,
    ) -> Result<RawResponse, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RawResponse, TransportError>>,
    {
        let max_attempts = self.max_attempts(method);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                attempt = attempt,
                max_attempts = max_attempts,
                method = %method,
                "Executing request"
            );

            let outcome = match timeout(self.retry_config.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_elapsed) => {
                    warn!(
                        attempt = attempt,
                        timeout_ms = self.retry_config.attempt_timeout.as_millis() as u64,
                        "Request timed out"
                    );
                    Err(TransportError::Timeout)
                }
            };

            let retryable = match &outcome {
                Ok(response) => self.should_retry_status(response.status),
                Err(error) => error.is_retryable(),
            };
            if !retryable || attempt >= max_attempts {
                return outcome;
            }

            let delay = self.calculate_delay(attempt - 1);
            match &outcome {
                Ok(response) => warn!(
                    attempt = attempt,
                    status = response.status,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after retryable status"
                ),
                Err(error) => warn!(
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after transport failure"
                ),
            }
            sleep(delay).await;
        }
    }

    /// Calculate delay for the given retry using exponential backoff
    fn calculate_delay(&self, retry: u32) -> Duration {
        let delay_ms = self.retry_config.base_delay.as_millis() as f64
            * self
                .retry_config
                .backoff_multiplier
                .powi(retry.min(i32::MAX as u32) as i32);

        let max_ms = self.retry_config.max_delay.as_millis() as f64;
        Duration::from_millis(delay_ms.min(max_ms).max(0.0) as u64)
    }
}
