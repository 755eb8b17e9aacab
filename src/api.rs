//! HTTP seam to the hosted APIs, with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: one typed request/response exchange with a hosted API
//! - [`RetryAsk`]: decorator that retries any [`AskAsync`] under a
//!   [`RetryPolicy`]
//! - [`http_client`] / [`read_json`]: the shared `reqwest` plumbing used by
//!   the concrete search and completion clients
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=max_jitter)
//! ```
//!
//! Every failure is retried (transport errors, timeouts, non-2xx statuses and
//! undecodable bodies) until `max_attempts` calls have been made; the last
//! error is then returned to the caller.

use crate::error::ApiError;
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// One exchange with a hosted API.
///
/// Implemented by the real HTTP clients and by fakes in tests.
pub trait AskAsync {
    /// What the caller sends.
    type Request;
    /// What the API answers, already decoded.
    type Response;

    /// Perform a single attempt. Retrying is the job of [`RetryAsk`].
    async fn ask(&self, request: &Self::Request) -> Result<Self::Response, ApiError>;
}

impl<T: AskAsync> AskAsync for &T {
    type Request = T::Request;
    type Response = T::Response;

    async fn ask(&self, request: &Self::Request) -> Result<Self::Response, ApiError> {
        (**self).ask(request).await
    }
}

/// Bounds for [`RetryAsk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of calls, including the first one. Always at least 1.
    pub max_attempts: usize,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: StdDuration,
    /// Cap on the exponential part of the delay.
    pub max_delay: StdDuration,
    /// Upper bound of the random jitter added to every delay.
    pub max_jitter: StdDuration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: StdDuration::from_secs(1),
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the next call, after `failures` failed calls.
    pub fn delay_after(&self, failures: usize) -> StdDuration {
        let exp = u32::try_from(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max_delay);

        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            delay
        } else {
            delay + StdDuration::from_millis(rng().random_range(0..=jitter_ms))
        }
    }
}

/// Wrapper that adds bounded exponential backoff to any [`AskAsync`].
pub struct RetryAsk<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: AskAsync> RetryAsk<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Number of calls made before an error is surfaced.
    pub fn max_attempts(&self) -> usize {
        self.policy.max_attempts.max(1)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("policy", &self.policy)
            .finish()
    }
}

impl<T: AskAsync> AskAsync for RetryAsk<T> {
    type Request = T::Request;
    type Response = T::Response;

    #[instrument(level = "debug", skip_all)]
    async fn ask(&self, request: &Self::Request) -> Result<Self::Response, ApiError> {
        let total_t0 = Instant::now();
        let max_attempts = self.max_attempts();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_attempt = attempt_t0.elapsed().as_millis();
                    let elapsed_ms_total = total_t0.elapsed().as_millis();

                    if attempt >= max_attempts {
                        error!(
                            attempt,
                            max = max_attempts,
                            elapsed_ms_attempt,
                            elapsed_ms_total,
                            error = %e,
                            "API call exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt,
                        elapsed_ms_total,
                        ?delay,
                        error = %e,
                        "API call failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Build the shared HTTP client with a per-request timeout.
pub fn http_client(timeout: StdDuration) -> Result<reqwest::Client, ApiError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()?;
    Ok(client)
}

/// Turn a response into `T`, treating non-2xx statuses and undecodable bodies
/// as errors.
pub async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            body: truncate_for_log(&body, 300),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        debug!(%status, body = %truncate_for_log(&body, 300), "Undecodable API response");
        ApiError::Decode(e)
    })
}
