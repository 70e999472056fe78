//! Completion service trait for LLM calls.
//!
//! The pipeline never talks to a model provider directly. Every LLM stage
//! builds a [`CompletionRequest`] and hands it to an injected
//! [`CompletionService`], which returns raw text. The pipeline assumes
//! nothing about that text and always parses it defensively.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The pipeline stage a completion call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pull requirement candidates out of one chunk.
    Extract,
    /// Normalize category/modality of one record.
    Classify,
    /// Attach precise evidence to one record.
    Ground,
    /// Classify many records in one call.
    BatchClassify,
    /// Ground many records from one chunk in one call.
    BatchGround,
}

impl Stage {
    /// Stable snake_case name used in logs and errors.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Classify => "classify",
            Self::Ground => "ground",
            Self::BatchClassify => "batch_classify",
            Self::BatchGround => "batch_ground",
        }
    }

    /// Whether the stage expects a JSON array back.
    pub fn expects_list(&self) -> bool {
        matches!(self, Self::Extract | Self::BatchClassify | Self::BatchGround)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One call to the completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Stage issuing the call
    pub stage: Stage,

    /// Stage instructions (system prompt)
    pub instructions: String,

    /// Chunk text or record JSON, plus any retry instruction
    pub input: String,

    /// Source chunk text for grounding stages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl CompletionRequest {
    /// Create a request without grounding context.
    pub fn new(stage: Stage, instructions: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            stage,
            instructions: instructions.into(),
            input: input.into(),
            context: None,
        }
    }

    /// Attach the source chunk text.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Render the user message sent to chat-style models.
    pub fn user_message(&self) -> String {
        match &self.context {
            Some(context) => format!("Chunk text:\n{}\n\nInput:\n{}", context, self.input),
            None => self.input.clone(),
        }
    }
}

/// Completion service used by every LLM stage.
///
/// Implementations wrap a specific provider (OpenAI, Azure, a local model)
/// and own transport concerns such as timeouts. A timeout should surface as
/// a retryable [`ExtractionError::Completion`](crate::ExtractionError).
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Run one completion and return the raw model text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_includes_context() {
        let request = CompletionRequest::new(Stage::Ground, "ground it", "{\"quote\":\"x\"}")
            .with_context("Section L\nOfferors shall ...");

        let message = request.user_message();
        assert!(message.starts_with("Chunk text:\nSection L"));
        assert!(message.ends_with("{\"quote\":\"x\"}"));
    }

    #[test]
    fn test_stage_shapes() {
        assert!(Stage::Extract.expects_list());
        assert!(Stage::BatchGround.expects_list());
        assert!(!Stage::Classify.expects_list());
        assert_eq!(Stage::BatchClassify.to_string(), "batch_classify");
    }
}
