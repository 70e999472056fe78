//! Completion service implementations.
//!
//! Reference implementations of the `CompletionService` trait. Users can use
//! these directly or implement their own.

mod rate_limited;

#[cfg(feature = "openai")]
mod openai;

#[cfg(feature = "openai")]
pub use openai::OpenAICompletion;

pub use rate_limited::{CompletionServiceExt, RateLimitedCompletion};

use async_trait::async_trait;

use crate::error::{ExtractionError, Result};
use crate::traits::completion::{CompletionRequest, CompletionService};

/// A completion service that refuses every call.
///
/// Used when the LLM stages are turned off; any call that still reaches it
/// fails the document instead of silently degrading.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCompletion;

#[async_trait]
impl CompletionService for DisabledCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        Err(ExtractionError::fatal(format!(
            "completion service disabled ({} call refused)",
            request.stage
        )))
    }
}
