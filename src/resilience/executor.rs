use std::future::Future;

use tokio_util::sync::CancellationToken;

use super::{Failure, RetryError, RetryPolicy};

/// Runs a fallible operation under a [`RetryPolicy`].
///
/// Success and fatal failures return immediately. Retryable failures are
/// retried after an exponential delay until the policy is used up. The
/// cancellation token is honoured before each attempt, while an attempt is in
/// flight, and during every delay.
#[derive(Debug, Clone, Default)]
pub struct BackoffExecutor {
    policy: RetryPolicy,
}

impl BackoffExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure<E>>>,
        E: std::fmt::Display,
    {
        let mut attempts: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                outcome = operation() => outcome,
            };
            attempts = attempts.saturating_add(1);

            let error = match outcome {
                Ok(value) => return Ok(value),
                Err(Failure::Fatal(error)) => return Err(RetryError::Fatal(error)),
                Err(Failure::Retryable(error)) => error,
            };

            if attempts >= self.policy.max_attempts() {
                return Err(RetryError::Exhausted {
                    attempts,
                    last: error,
                });
            }

            let delay = self.policy.backoff.delay_for(attempts);
            tracing::warn!(
                attempt = attempts,
                max_retries = self.policy.max_retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable failure, backing off"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
