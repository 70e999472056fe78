//! Configuration types for segmentation, extraction and merge.
//!
//! Every tunable is passed explicitly; nothing in the library reads
//! process state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How pages are turned into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SegmentMode {
    /// Split on heading-like lines, flushing on size.
    HeadingAware,
    /// One chunk per page, splitting oversized pages.
    PerPage,
    /// N consecutive pages per chunk with `[Page k]` markers.
    PageGroups { pages_per_chunk: usize },
}

/// Configuration for the segmenter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Maximum chunk length in characters.
    ///
    /// Default: 6000.
    pub max_chars: usize,

    /// Trailing characters carried into the next chunk.
    ///
    /// Clamped below half of `max_chars`. Default: 600.
    pub overlap: usize,

    /// Segmentation mode. Default: heading-aware.
    pub mode: SegmentMode,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_chars: 6000,
            overlap: 600,
            mode: SegmentMode::HeadingAware,
        }
    }
}

impl SegmenterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_mode(mut self, mode: SegmentMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Configuration for the LLM extraction stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Retries after the first failed single-item call. Default: 2.
    pub retries: u32,

    /// Pause between single-item attempts. Default: 500ms.
    pub retry_sleep_ms: u64,

    /// Retries after a failed batch call. Default: 1.
    pub batch_retries: u32,

    /// Pause between batch attempts. Default: 400ms.
    pub batch_retry_sleep_ms: u64,

    /// Records per batched classify call. Default: 20.
    pub classify_batch_size: usize,

    /// Records per batched ground call (per chunk). Default: 10.
    pub ground_batch_size: usize,

    /// Run the LLM stages at all. When false only the regex fast path runs.
    ///
    /// Default: true.
    pub enable_llm: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            retry_sleep_ms: 500,
            batch_retries: 1,
            batch_retry_sleep_ms: 400,
            classify_batch_size: 20,
            ground_batch_size: 10,
            enable_llm: true,
        }
    }
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set single-item retries and the pause between them.
    pub fn with_retries(mut self, retries: u32, sleep: Duration) -> Self {
        self.retries = retries;
        self.retry_sleep_ms = sleep.as_millis() as u64;
        self
    }

    /// Set batch retries and the pause between them.
    pub fn with_batch_retries(mut self, retries: u32, sleep: Duration) -> Self {
        self.batch_retries = retries;
        self.batch_retry_sleep_ms = sleep.as_millis() as u64;
        self
    }

    pub fn with_batch_sizes(mut self, classify: usize, ground: usize) -> Self {
        self.classify_batch_size = classify;
        self.ground_batch_size = ground;
        self
    }

    pub fn with_llm(mut self, enabled: bool) -> Self {
        self.enable_llm = enabled;
        self
    }

    pub fn retry_sleep(&self) -> Duration {
        Duration::from_millis(self.retry_sleep_ms)
    }

    pub fn batch_retry_sleep(&self) -> Duration {
        Duration::from_millis(self.batch_retry_sleep_ms)
    }
}

/// Configuration for merge/dedupe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Token-set similarity (0-100) at which two records collapse.
    ///
    /// Default: 90.
    pub similarity_threshold: f64,

    /// Rare tokens two records must share before fuzzy comparison.
    ///
    /// Default: 3.
    pub min_shared_tokens: usize,

    /// Shortest token counted for blocking. Default: 3.
    pub min_token_len: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 90.0,
            min_shared_tokens: 3,
            min_token_len: 3,
        }
    }
}

impl MergeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_min_shared_tokens(mut self, count: usize) -> Self {
        self.min_shared_tokens = count;
        self
    }
}

/// Configuration for a whole pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub extraction: ExtractionConfig,
    pub merge: MergeConfig,

    /// Documents processed at once. Default: 1 (sequential).
    pub document_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            extraction: ExtractionConfig::default(),
            merge: MergeConfig::default(),
            document_concurrency: 1,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segmenter(mut self, segmenter: SegmenterConfig) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn with_merge(mut self, merge: MergeConfig) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_document_concurrency(mut self, concurrency: usize) -> Self {
        self.document_concurrency = concurrency.max(1);
        self
    }
}
