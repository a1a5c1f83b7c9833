//! Bounded exponential-backoff retry for outbound model calls.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use tracing::warn;

use crate::config::RetryConfig;

/// Status codes worth another attempt
const RETRYABLE_STATUS_CODES: [StatusCode; 6] = [
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUS_CODES.contains(&status)
}

/// Anything with an HTTP status the retry loop can inspect
pub trait HttpOutcome {
    fn status(&self) -> StatusCode;
}

impl HttpOutcome for reqwest::Response {
    fn status(&self) -> StatusCode {
        reqwest::Response::status(self)
    }
}

/// Transport failure that survived every attempt
#[derive(Debug)]
pub struct RetriesExhausted<E> {
    pub attempts: u32,
    pub error: E,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.base_delay_ms),
        )
    }

    /// Delay slept before retry number `retry` (1-based): `base * 2^(retry - 1)`
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Run `request_factory` until it yields a non-retryable response or the
    /// retry budget is spent.
    ///
    /// The factory is called once per attempt, so every attempt sends a freshly
    /// built request. A response that is still retryable on the final attempt
    /// is returned as-is; a transport error on the final attempt is returned as
    /// [`RetriesExhausted`].
    pub async fn execute<R, E, F, Fut>(
        &self,
        mut request_factory: F,
    ) -> Result<R, RetriesExhausted<E>>
    where
        R: HttpOutcome,
        E: std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let final_attempt = attempt > self.max_retries;

            match request_factory().await {
                Ok(response) => {
                    let status = response.status();
                    if !is_retryable_status(status) || final_attempt {
                        return Ok(response);
                    }
                    warn!(
                        status = status.as_u16(),
                        attempt,
                        max_attempts = self.max_retries + 1,
                        "Retryable status from upstream"
                    );
                }
                Err(error) => {
                    if final_attempt {
                        return Err(RetriesExhausted {
                            attempts: attempt,
                            error,
                        });
                    }
                    warn!(
                        error = %error,
                        attempt,
                        max_attempts = self.max_retries + 1,
                        "Upstream request failed"
                    );
                }
            }

            metrics::counter!("llm_retries_total").increment(1);
            tokio::time::sleep(self.delay_before_retry(attempt)).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
