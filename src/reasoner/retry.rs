//! Retry wrapper with exponential backoff

use super::types::{Reasoner, ReasonerError, ReasonerRequest, ReasonerResponse, RetryPolicy};
use async_trait::async_trait;

/// Wrapper that adds bounded retries to any reasoner
pub struct RetryReasoner<T: Reasoner> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: Reasoner> RetryReasoner<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<T: Reasoner> Reasoner for RetryReasoner<T> {
    async fn invoke(&self, request: &ReasonerRequest) -> Result<ReasonerResponse, ReasonerError> {
        let mut attempt = 0;

        loop {
            match self.inner.invoke(request).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() || attempt >= self.policy.max_retries => {
                    return Err(e);
                }
                Err(e) => {
                    // Server-specified retry-after wins over backoff
                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| self.policy.delay_for_attempt(attempt));

                    tracing::warn!(
                        reasoner = self.inner.name(),
                        task = %request.task,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying reasoner call"
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
