use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::ProviderError;
use crate::config::AnalysisConfig;

/// Fixed-backoff retry for provider calls. Only retryable provider errors
/// trigger another attempt; the wait is a timer, not a blocked thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.backoff_secs))
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, ProviderError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        backoff_secs = self.backoff.as_secs(),
                        error = %err,
                        "analysis attempt failed; retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "analysis attempt failed; giving up");
                    return Err(err);
                }
            }
        }
    }
}
