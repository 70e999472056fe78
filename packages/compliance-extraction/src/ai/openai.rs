//! OpenAI-compatible chat completion service.
//!
//! # Example
//!
//! ```rust,ignore
//! use compliance_extraction::ai::OpenAICompletion;
//! use compliance_extraction::security::CompletionCredentials;
//!
//! let service = OpenAICompletion::new(CompletionCredentials::from_env()?);
//! let pipeline = Pipeline::new(service);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ExtractionError, Result};
use crate::security::CompletionCredentials;
use crate::traits::completion::{CompletionRequest, CompletionService};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client. Temperature is fixed at 0.
#[derive(Clone)]
pub struct OpenAICompletion {
    client: Client,
    credentials: CompletionCredentials,
    max_tokens: u32,
}

impl OpenAICompletion {
    pub fn new(credentials: CompletionCredentials) -> Self {
        Self::with_timeout(credentials, DEFAULT_TIMEOUT)
    }

    /// Set the per-request timeout. A timeout surfaces as a retryable error.
    pub fn with_timeout(credentials: CompletionCredentials, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            credentials,
            max_tokens: 4096,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.credentials.model
    }
}

#[async_trait]
impl CompletionService for OpenAICompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.credentials.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.instructions.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.user_message(),
                },
            ],
            temperature: 0.0,
            max_tokens: self.max_tokens,
        };

        debug!(stage = %request.stage, model = %self.credentials.model, "Sending completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.credentials.base_url))
            .bearer_auth(self.credentials.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(ExtractionError::transient)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let message = format!("OpenAI API error {}: {}", status, error_text);
            return Err(if is_retryable(status) {
                ExtractionError::transient(message)
            } else {
                ExtractionError::fatal(message)
            });
        }

        let chat: ChatResponse = response.json().await.map_err(ExtractionError::transient)?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::transient("No response from OpenAI"))
    }
}

/// 408, 429 and 5xx are worth retrying; other failures (bad key, unknown
/// model, malformed request) are not.
fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
