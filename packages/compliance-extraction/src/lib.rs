//! Compliance Requirement Extraction Library
//!
//! Turns the text of solicitation documents (RFPs, RFQs, statements of work)
//! into a deduplicated, cited set of compliance requirements.
//!
//! # Design Philosophy
//!
//! **"Never trust the model, never lose a citation"**
//!
//! - Cheap regex fast path first, LLM stages second
//! - Model output is parsed defensively and every stage degrades instead of failing
//! - Batched calls are realigned by echoed index, never by position alone
//! - Merging is deterministic and idempotent; every source citation survives
//!
//! # Usage
//!
//! ```rust,ignore
//! use compliance_extraction::{Pipeline, PipelineConfig};
//! use compliance_extraction::loaders::TextLoader;
//! use compliance_extraction::testing::MockCompletion;
//!
//! let pipeline = Pipeline::with_config(MockCompletion::new(), PipelineConfig::default());
//!
//! let report = pipeline.run(&TextLoader::new(), &paths).await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Collaborator boundaries (CompletionService, DocumentLoader)
//! - [`types`] - Pages, chunks, regex hits, requirements and configuration
//! - [`pipeline`] - Segmenter, fast path, LLM stages, merge and orchestration
//! - [`ai`] - Completion service implementations (OpenAI, rate limiting)
//! - [`loaders`] - Document loaders (plain text, mock)
//! - [`security`] - Credential handling
//! - [`testing`] - Mock completion service for testing

pub mod ai;
pub mod error;
pub mod loaders;
pub mod pipeline;
pub mod security;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{ExtractionError, Result};
pub use traits::{
    completion::{CompletionRequest, CompletionService, Stage},
    loader::DocumentLoader,
};
pub use types::{
    chunk::Chunk,
    config::{ExtractionConfig, MergeConfig, PipelineConfig, SegmentMode, SegmenterConfig},
    hit::{HitKind, RegexHit},
    page::{Document, Page},
    requirement::{Category, Citation, Modality, RecordSource, Requirement, Strength},
};

// Re-export pipeline components
pub use pipeline::{
    // Orchestration
    DocumentFailure, DocumentOutcome, DocumentReport, Pipeline, RunReport, RequirementStats,
    // Deterministic stages
    fast_hits, merge, segment,
    // Retry policy
    RetryPolicy,
};

// Re-export completion services
pub use ai::{CompletionServiceExt, DisabledCompletion, RateLimitedCompletion};

#[cfg(feature = "openai")]
pub use ai::OpenAICompletion;

// Re-export loaders
pub use loaders::{MockLoader, TextLoader};

// Re-export testing utilities
pub use testing::MockCompletion;
