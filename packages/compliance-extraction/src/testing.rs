//! Testing utilities including mock implementations.
//!
//! These are useful for testing code that drives the pipeline without
//! making real LLM calls.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::error::{ExtractionError, Result};
use crate::traits::completion::{CompletionRequest, CompletionService, Stage};

type Handler = Arc<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

enum Scripted {
    Reply(String),
    Error(ExtractionError),
}

/// A deterministic completion service for testing.
///
/// Each call is answered, in order of preference, by:
/// 1. the next scripted reply or error queued for its stage,
/// 2. a handler registered for its stage,
/// 3. the default behavior: Extract returns `[]`, every other stage echoes
///    its input back unchanged (so Classify/Ground keep records as they are
///    and batches align perfectly).
///
/// # Example
///
/// ```rust
/// use compliance_extraction::testing::MockCompletion;
/// use compliance_extraction::traits::completion::Stage;
///
/// let service = MockCompletion::new()
///     .with_reply(Stage::Extract, r#"[{"quote": "Offerors shall comply."}]"#);
/// ```
#[derive(Default, Clone)]
pub struct MockCompletion {
    scripted: Arc<RwLock<HashMap<Stage, VecDeque<Scripted>>>>,
    handlers: Arc<RwLock<HashMap<Stage, Handler>>>,
    calls: Arc<RwLock<Vec<CompletionRequest>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw reply for the next call of `stage`.
    pub fn with_reply(self, stage: Stage, reply: impl Into<String>) -> Self {
        self.push(stage, Scripted::Reply(reply.into()));
        self
    }

    /// Queue an error for the next call of `stage`.
    pub fn with_error(self, stage: Stage, error: ExtractionError) -> Self {
        self.push(stage, Scripted::Error(error));
        self
    }

    /// Answer every unscripted call of `stage` with `handler`.
    pub fn with_handler<F>(self, stage: Stage, handler: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .unwrap()
            .insert(stage, Arc::new(handler));
        self
    }

    /// All calls made so far.
    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.calls.read().unwrap().clone()
    }

    /// Calls made for one stage.
    pub fn calls_for(&self, stage: Stage) -> Vec<CompletionRequest> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.stage == stage)
            .cloned()
            .collect()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn push(&self, stage: Stage, scripted: Scripted) {
        self.scripted
            .write()
            .unwrap()
            .entry(stage)
            .or_default()
            .push_back(scripted);
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.write().unwrap().push(request.clone());

        let scripted = self
            .scripted
            .write()
            .unwrap()
            .get_mut(&request.stage)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(Scripted::Reply(reply)) => return Ok(reply),
            Some(Scripted::Error(error)) => return Err(error),
            None => {}
        }

        let handler = self.handlers.read().unwrap().get(&request.stage).cloned();
        if let Some(handler) = handler {
            return handler(request);
        }

        Ok(match request.stage {
            Stage::Extract => "[]".to_string(),
            _ => request.input.clone(),
        })
    }
}
