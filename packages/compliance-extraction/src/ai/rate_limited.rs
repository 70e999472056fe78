//! Rate-limited completion wrapper.
//!
//! Wraps any CompletionService with a governor quota so a run never exceeds
//! the provider's request rate.

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use std::sync::Arc;

use crate::error::Result;
use crate::traits::completion::{CompletionRequest, CompletionService};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A completion service wrapper that enforces a request rate.
pub struct RateLimitedCompletion<C: CompletionService> {
    inner: C,
    limiter: Arc<DefaultRateLimiter>,
}

impl<C: CompletionService> RateLimitedCompletion<C> {
    /// Limit to `requests_per_second` (zero is treated as one).
    pub fn new(service: C, requests_per_second: u32) -> Self {
        Self::with_quota(service, Quota::per_second(at_least_one(requests_per_second)))
    }

    /// Sustained rate plus a burst allowance.
    pub fn with_burst(service: C, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(at_least_one(requests_per_second))
            .allow_burst(at_least_one(burst));
        Self::with_quota(service, quota)
    }

    pub fn with_quota(service: C, quota: Quota) -> Self {
        Self {
            inner: service,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

fn at_least_one(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(nonzero!(1u32))
}

#[async_trait]
impl<C: CompletionService> CompletionService for RateLimitedCompletion<C> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.limiter.until_ready().await;
        self.inner.complete(request).await
    }
}

/// Extension trait for easy rate limiting.
pub trait CompletionServiceExt: CompletionService + Sized {
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedCompletion<Self> {
        RateLimitedCompletion::new(self, requests_per_second)
    }
}

impl<C: CompletionService + Sized> CompletionServiceExt for C {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockCompletion;
    use crate::traits::completion::Stage;
    use std::time::Instant;

    #[tokio::test]
    async fn test_rate_limiting() {
        // 2 requests per second
        let service = MockCompletion::new().rate_limited(2);
        let request = CompletionRequest::new(Stage::Extract, "extract", "text");

        let start = Instant::now();
        for _ in 0..3 {
            service.complete(&request).await.unwrap();
        }
        let elapsed = start.elapsed();

        assert_eq!(service.inner().calls().len(), 3);
        assert!(elapsed.as_millis() >= 400, "Rate limiting not working: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_burst_allows_immediate_calls() {
        let service = RateLimitedCompletion::with_burst(MockCompletion::new(), 1, 3);
        let request = CompletionRequest::new(Stage::Extract, "extract", "text");

        let start = Instant::now();
        for _ in 0..3 {
            service.complete(&request).await.unwrap();
        }
        let elapsed = start.elapsed();

        assert_eq!(service.inner().calls().len(), 3);
        assert!(elapsed.as_millis() < 500, "Burst was throttled: {:?}", elapsed);
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        assert_eq!(at_least_one(0).get(), 1);
        assert_eq!(at_least_one(5).get(), 5);
    }
}
