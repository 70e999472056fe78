//! The Pipeline - sequences every stage per document and across documents.
//!
//! Per document:
//!
//! ```text
//! pages -> segment -> per chunk: regex fast path + Extract
//!       -> batched Classify (fixed-size batches)
//!       -> regroup by chunk -> batched Ground (per chunk, fixed-size sub-batches)
//!       -> normalize, validate, tag with document name, score
//! ```
//!
//! Across documents the per-document record sets are concatenated in input
//! order and merged once. A document that fails (load error, rejected
//! credentials) is reported and skipped; its siblings still run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::pipeline::batch::{batch_classify, batch_ground};
use crate::pipeline::confidence;
use crate::pipeline::fast_path::{fast_hits, hit_to_requirement};
use crate::pipeline::merge::merge;
use crate::pipeline::retry::RetryPolicy;
use crate::pipeline::segment::segment;
use crate::pipeline::stages;
use crate::pipeline::stats::RequirementStats;
use crate::traits::completion::CompletionService;
use crate::traits::loader::DocumentLoader;
use crate::types::chunk::Chunk;
use crate::types::config::PipelineConfig;
use crate::types::page::{Document, Page};
use crate::types::requirement::{Modality, Requirement, IDX_KEY};

/// Per-document counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub name: String,
    pub chunks: usize,
    pub regex_hits: usize,
    pub llm_extracted: usize,
    pub classified: usize,
    pub grounded: usize,
    /// Records dropped for missing category, modality or quote
    pub skipped_invalid: usize,
    pub kept: usize,
}

impl DocumentReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Valid records of one document plus its counters.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub records: Vec<Requirement>,
    pub report: DocumentReport,
}

/// A document that contributed nothing because it failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub name: String,
    pub error: String,
}

/// Result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,

    /// Canonical, merged requirements
    pub requirements: Vec<Requirement>,

    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
    pub stats: RequirementStats,
}

/// The extraction pipeline over an injected completion service.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::with_config(service, PipelineConfig::default());
/// let report = pipeline.run(&TextLoader::new(), &paths).await;
/// println!("{} requirements", report.requirements.len());
/// ```
pub struct Pipeline<C: CompletionService> {
    service: C,
    config: PipelineConfig,
}

impl<C: CompletionService> Pipeline<C> {
    /// Create a pipeline with default configuration.
    pub fn new(service: C) -> Self {
        Self::with_config(service, PipelineConfig::default())
    }

    /// Create with custom configuration.
    pub fn with_config(service: C, config: PipelineConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn service(&self) -> &C {
        &self.service
    }

    /// Run the per-document stages.
    ///
    /// Recoverable stage failures degrade inside; an `Err` here means the
    /// document as a whole must be abandoned.
    pub async fn process_document(&self, name: &str, pages: &[Page]) -> Result<DocumentOutcome> {
        let mut report = DocumentReport::new(name);
        let extraction = &self.config.extraction;

        let chunks = segment(pages, &self.config.segmenter);
        report.chunks = chunks.len();
        info!(document = name, pages = pages.len(), chunks = chunks.len(), "Segmented document");

        // 1. Regex fast path and Extract, chunk by chunk
        let mut regex_records = Vec::new();
        let mut extracted = Vec::new();
        let single = RetryPolicy::single(extraction);

        for chunk in &chunks {
            let hits = fast_hits(chunk);
            report.regex_hits += hits.len();
            regex_records.extend(hits.iter().map(hit_to_requirement));

            if extraction.enable_llm {
                let records = stages::extract(&self.service, chunk, single).await?;
                debug!(
                    document = name,
                    chunk = chunk.index,
                    regex = hits.len(),
                    llm = records.len(),
                    "Processed chunk"
                );
                extracted.extend(records);
            }
        }
        report.llm_extracted = extracted.len();

        // 2. Classify and ground the LLM records
        let grounded = if extraction.enable_llm {
            let classified = self.classify_all(name, &extracted).await?;
            report.classified = classified.len();

            let grounded = self.ground_by_chunk(name, &chunks, classified).await?;
            report.grounded = grounded.iter().filter(|r| r.grounded).count();
            grounded
        } else {
            Vec::new()
        };

        // 3. Normalize, validate, score
        let mut records = Vec::with_capacity(regex_records.len() + grounded.len());
        for mut record in regex_records.into_iter().chain(grounded) {
            normalize_record(&mut record, name, &chunks);
            if !record.is_valid() {
                report.skipped_invalid += 1;
                warn!(
                    document = name,
                    quote = %truncate(&record.quote, 80),
                    "Dropping record missing category, modality or quote"
                );
                continue;
            }
            confidence::annotate(&mut record);
            records.push(record);
        }
        report.kept = records.len();

        info!(
            document = name,
            regex_hits = report.regex_hits,
            llm_extracted = report.llm_extracted,
            classified = report.classified,
            grounded = report.grounded,
            skipped = report.skipped_invalid,
            kept = report.kept,
            "Document complete"
        );

        Ok(DocumentOutcome { records, report })
    }

    /// Process already-loaded documents and merge once.
    pub async fn run_documents(&self, documents: Vec<Document>) -> RunReport {
        let concurrency = self.config.document_concurrency.max(1);

        let outcomes: Vec<(String, Result<DocumentOutcome>)> = stream::iter(documents)
            .map(|document| async move {
                let result = self.process_document(&document.name, &document.pages).await;
                (document.name, result)
            })
            .buffered(concurrency)
            .collect()
            .await;

        self.finish(outcomes)
    }

    /// Load and process documents from paths, then merge once.
    ///
    /// Load failures are reported per document like any other failure.
    pub async fn run<L>(&self, loader: &L, paths: &[PathBuf]) -> RunReport
    where
        L: DocumentLoader + ?Sized,
    {
        let concurrency = self.config.document_concurrency.max(1);

        let outcomes: Vec<(String, Result<DocumentOutcome>)> = stream::iter(paths)
            .map(|path| async move {
                let name = Document::name_for(path);
                let result = match loader.load(path).await {
                    Ok(pages) => self.process_document(&name, &pages).await,
                    Err(e) => Err(e),
                };
                (name, result)
            })
            .buffered(concurrency)
            .collect()
            .await;

        self.finish(outcomes)
    }

    async fn classify_all(&self, name: &str, records: &[Requirement]) -> Result<Vec<Requirement>> {
        let size = self.config.extraction.classify_batch_size.max(1);
        let policy = RetryPolicy::batch(&self.config.extraction);

        let mut classified = Vec::with_capacity(records.len());
        for (batch_index, batch) in records.chunks(size).enumerate() {
            let aligned = batch_classify(&self.service, batch, policy).await?;
            debug!(
                document = name,
                batch = batch_index,
                sent = batch.len(),
                recovered = aligned.len(),
                "Classified batch"
            );
            classified.extend(aligned.into_iter().map(|a| a.record));
        }
        Ok(classified)
    }

    async fn ground_by_chunk(
        &self,
        name: &str,
        chunks: &[Chunk],
        records: Vec<Requirement>,
    ) -> Result<Vec<Requirement>> {
        let size = self.config.extraction.ground_batch_size.max(1);
        let policy = RetryPolicy::batch(&self.config.extraction);

        let mut by_chunk: BTreeMap<usize, Vec<Requirement>> = BTreeMap::new();
        let mut orphans = Vec::new();
        for mut record in records {
            record.extra.remove(IDX_KEY);
            match record.chunk_index {
                Some(index) if index < chunks.len() => by_chunk.entry(index).or_default().push(record),
                _ => orphans.push(record),
            }
        }

        let mut grounded = Vec::new();
        for (index, group) in by_chunk {
            let chunk = &chunks[index];
            for batch in group.chunks(size) {
                let aligned = batch_ground(&self.service, chunk, batch, policy).await?;
                debug!(
                    document = name,
                    chunk = index,
                    sent = batch.len(),
                    recovered = aligned.len(),
                    "Grounded batch"
                );
                grounded.extend(aligned.into_iter().map(|a| a.record));
            }
        }

        if !orphans.is_empty() {
            warn!(document = name, count = orphans.len(), "Records without a chunk skip grounding");
            grounded.extend(orphans);
        }
        Ok(grounded)
    }

    fn finish(&self, outcomes: Vec<(String, Result<DocumentOutcome>)>) -> RunReport {
        let mut records = Vec::new();
        let mut documents = Vec::new();
        let mut failures = Vec::new();

        for (name, result) in outcomes {
            match result {
                Ok(outcome) => {
                    records.extend(outcome.records);
                    documents.push(outcome.report);
                }
                Err(e) => {
                    warn!(document = %name, error = %e, "Document failed, skipping");
                    failures.push(DocumentFailure {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }

        let incoming = records.len();
        let requirements = merge(records, &self.config.merge);
        let stats = RequirementStats::from_records(&requirements);

        info!(
            documents = documents.len(),
            failed = failures.len(),
            records = incoming,
            canonical = requirements.len(),
            "Run complete"
        );

        RunReport {
            run_id: Uuid::now_v7(),
            generated_at: Utc::now(),
            requirements,
            documents,
            failures,
            stats,
        }
    }
}

/// Fill defaults from the source chunk and strip bookkeeping.
fn normalize_record(record: &mut Requirement, doc_name: &str, chunks: &[Chunk]) {
    if let Some(chunk) = record.chunk_index.and_then(|i| chunks.get(i)) {
        if record.section.is_none() {
            record.section = Some(chunk.section.clone());
        }
        if record.page_start.is_none() {
            record.page_start = Some(chunk.start_page);
        }
        if record.page_end.is_none() {
            record.page_end = Some(chunk.end_page.max(record.page_start.unwrap_or(0)));
        }
    }
    if record.modality.is_none() {
        record.modality = Modality::detect(&record.quote);
    }

    record.chunk_index = None;
    record.extra.remove(IDX_KEY);
    record.doc_name = Some(doc_name.to_string());
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
