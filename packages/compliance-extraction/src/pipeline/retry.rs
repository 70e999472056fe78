//! Retry-then-degrade control flow for LLM stages.
//!
//! [`with_retries`] runs an attempt until it succeeds, fails fatally, or the
//! budget runs out. [`degrade`] is the single point where a recoverable
//! failure becomes the stage's fallback value.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::Result;
use crate::traits::completion::Stage;
use crate::types::config::ExtractionConfig;

/// How many extra attempts to make and how long to pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one
    pub retries: u32,

    /// Fixed pause between attempts
    pub sleep: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, sleep: Duration) -> Self {
        Self { retries, sleep }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Policy for single-item Extract/Classify/Ground calls.
    pub fn single(config: &ExtractionConfig) -> Self {
        Self::new(config.retries, config.retry_sleep())
    }

    /// Policy for batched Classify/Ground calls.
    pub fn batch(config: &ExtractionConfig) -> Self {
        Self::new(config.batch_retries, config.batch_retry_sleep())
    }
}

/// Run `attempt` until it succeeds or the retry budget is spent.
///
/// The closure receives the 0-based attempt number so later attempts can
/// strengthen their instructions. Fatal errors stop immediately.
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, stage: Stage, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0;

    loop {
        match attempt(tries).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) if tries < policy.retries => {
                tries += 1;
                warn!(
                    stage = %stage,
                    error = %e,
                    retry = tries,
                    max_retries = policy.retries,
                    "Stage call failed, retrying..."
                );
                if !policy.sleep.is_zero() {
                    sleep(policy.sleep).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Replace a recoverable failure with the stage fallback.
///
/// Fatal errors (rejected credentials, unknown model) still propagate so the
/// caller can abort the document.
pub fn degrade<T>(stage: Stage, result: Result<T>, fallback: impl FnOnce() -> T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(stage = %stage, error = %e, "Stage gave up, using fallback");
            Ok(fallback())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn malformed() -> ExtractionError {
        ExtractionError::MalformedResponse {
            stage: Stage::Extract,
            reason: "no JSON".into(),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retries(RetryPolicy::new(2, Duration::ZERO), Stage::Extract, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(malformed())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(RetryPolicy::new(1, Duration::ZERO), Stage::Ground, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(malformed()) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fatal_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries(RetryPolicy::new(5, Duration::ZERO), Stage::Classify, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ExtractionError::fatal("401 unauthorized")) }
        })
        .await;

        assert!(result.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts() {
        let started = tokio::time::Instant::now();
        let _: Result<()> = with_retries(
            RetryPolicy::new(2, Duration::from_millis(500)),
            Stage::Extract,
            |_| async { Err(ExtractionError::transient("timeout")) },
        )
        .await;

        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[test]
    fn test_policies_from_config() {
        let config = ExtractionConfig::default();
        assert_eq!(RetryPolicy::single(&config), RetryPolicy::new(2, Duration::from_millis(500)));
        assert_eq!(RetryPolicy::batch(&config), RetryPolicy::new(1, Duration::from_millis(400)));
    }

    #[test]
    fn test_degrade() {
        let ok = degrade(Stage::Extract, Ok(vec![1]), Vec::new).unwrap();
        assert_eq!(ok, vec![1]);

        let fallback: Vec<i32> = degrade(Stage::Extract, Err(malformed()), Vec::new).unwrap();
        assert!(fallback.is_empty());

        let fatal: Result<Vec<i32>> =
            degrade(Stage::Extract, Err(ExtractionError::fatal("403")), Vec::new);
        assert!(fatal.is_err());
    }
}
