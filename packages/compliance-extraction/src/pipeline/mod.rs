//! Extraction pipeline - the core of the library.
//!
//! The pipeline orchestrates:
//! - Segmentation of pages into heading-aware chunks
//! - The regex fast path (zero-LLM candidate hits)
//! - Extract / Classify / Ground with retry-then-degrade
//! - Batch index alignment for Classify and Ground
//! - Confidence scoring
//! - Two-pass merge/dedupe into canonical requirements

pub mod batch;
pub mod confidence;
pub mod fast_path;
pub mod json;
pub mod merge;
pub mod orchestrator;
pub mod prompts;
pub mod retry;
pub mod segment;
pub mod stages;
pub mod stats;

pub use batch::{align_batch, apply_model_fields, batch_classify, batch_ground, flatten_object, AlignedRecord};
pub use confidence::{annotate, score, MAX_SCORE};
pub use fast_path::{fast_hits, hit_to_requirement, requirement_summary, RequirementSummary};
pub use json::{parse_model_json, ParsedJson};
pub use merge::{canonical_key, core_text, merge, normalize, token_set_ratio};
pub use orchestrator::{DocumentFailure, DocumentOutcome, DocumentReport, Pipeline, RunReport};
pub use retry::{degrade, with_retries, RetryPolicy};
pub use segment::{is_heading_line, segment, UNKNOWN_SECTION};
pub use stages::{classify, extract, ground};
pub use stats::RequirementStats;
