//! Bounded retry for object store calls

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::StoreError;

/// Retry policy: a fixed number of attempts with doubling backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Minimal delays for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Run `operation`, retrying retryable failures until the attempts run out.
    ///
    /// Fatal failures are returned on first occurrence. Exhausting the attempts
    /// turns the last retryable failure into a fatal one.
    pub async fn run<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded on attempt {}", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(StoreError::Retryable(message)) if attempt < self.max_attempts => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name, attempt, self.max_attempts, message, delay
                    );
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(StoreError::Retryable(message)) => {
                    return Err(StoreError::Fatal(format!(
                        "{} gave up after {} attempts: {}",
                        operation_name, attempt, message
                    )));
                }
                Err(fatal) => return Err(fatal),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::immediate(3)
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StoreError::Retryable("flaky".into()))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Retryable("down".into()))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::immediate(3)
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Fatal("access denied".into()))
            })
            .await;

        assert_eq!(result, Err(StoreError::Fatal("access denied".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
