//! Typed errors for the compliance extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use std::path::PathBuf;

use thiserror::Error;

use crate::traits::completion::Stage;

/// Errors that can occur during extraction operations.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// Completion service call failed
    #[error("completion service error (retryable: {retryable}): {source}")]
    Completion {
        retryable: bool,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Model output could not be parsed as JSON
    #[error("malformed {stage} response: {reason}")]
    MalformedResponse { stage: Stage, reason: String },

    /// Model output parsed but had the wrong shape (list vs object)
    #[error("{stage} response was not a JSON {expected}")]
    UnexpectedShape { stage: Stage, expected: &'static str },

    /// Document loader could not produce pages
    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    /// Document format has no loader
    #[error("unsupported document format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

impl ExtractionError {
    /// A completion failure worth retrying (timeouts, rate limits, 5xx).
    pub fn transient(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Completion {
            retryable: true,
            source: source.into(),
        }
    }

    /// A completion failure that will not go away on retry (bad credentials, unknown model).
    pub fn fatal(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Completion {
            retryable: false,
            source: source.into(),
        }
    }

    /// Whether this error aborts the current document instead of degrading.
    ///
    /// Malformed output and transient completion failures go through
    /// retry-then-degrade; everything coming from a collaborator that cannot
    /// recover on its own is fatal for the document.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Completion { retryable, .. } => !retryable,
            Self::MalformedResponse { .. } | Self::UnexpectedShape { .. } | Self::Json(_) => false,
            Self::Load { .. } | Self::UnsupportedFormat { .. } | Self::Config(_) => true,
        }
    }
}

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ExtractionError::fatal("401 unauthorized").is_fatal());
        assert!(!ExtractionError::transient("timeout").is_fatal());
        assert!(!ExtractionError::MalformedResponse {
            stage: Stage::Extract,
            reason: "no JSON".into(),
        }
        .is_fatal());
        assert!(ExtractionError::UnsupportedFormat {
            path: PathBuf::from("rfp.pdf"),
        }
        .is_fatal());
    }

    #[test]
    fn test_display_includes_stage() {
        let err = ExtractionError::UnexpectedShape {
            stage: Stage::BatchClassify,
            expected: "array",
        };
        assert_eq!(err.to_string(), "batch_classify response was not a JSON array");
    }
}
