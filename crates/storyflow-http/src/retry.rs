//! Bounded retries over a [`Transport`]

use crate::transport::Transport;
use async_trait::async_trait;
use std::time::Duration;
use storyflow_core::{CoreError, HttpClient, HttpRequest, HttpResponse};
use tracing::{error, warn};

/// Backoff between attempts
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Growth factor applied after every further failure
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = (self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(exponent))
        .min(self.max_delay.as_millis() as f64);

        Duration::from_millis(delay_ms.max(0.0) as u64)
    }
}

/// [`HttpClient`] that retries transport failures
///
/// Any response ends the retry loop, whatever its status. Errors other than
/// [`CoreError::HttpTransportError`] are returned on the spot.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetryingHttpClient<T> {
    /// Create a client with the default policy
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the backoff policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: Transport> HttpClient for RetryingHttpClient<T> {
    async fn fetch_with_retry(
        &self,
        max_attempts: u32,
        request: HttpRequest,
    ) -> Result<HttpResponse, CoreError> {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.transport.send(&request).await {
                Ok(response) => return Ok(response),
                Err(CoreError::HttpTransportError(message)) if attempt < max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        request = %request,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "HTTP attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(CoreError::HttpTransportError(message)) => {
                    error!(request = %request, attempts = attempt, error = %message, "HTTP retries exhausted");
                    return Err(CoreError::HttpTransportError(format!(
                        "{} failed after {} attempts: {}",
                        request, attempt, message
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
