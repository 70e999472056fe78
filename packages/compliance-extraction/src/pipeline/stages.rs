//! Single-item Extract, Classify and Ground.
//!
//! Each stage is one completion call wrapped in retry-then-degrade:
//!
//! | Stage    | Expects | On exhaustion             |
//! |----------|---------|---------------------------|
//! | Extract  | array   | empty list                |
//! | Classify | object  | input record, unmodified  |
//! | Ground   | object  | input record, unmodified  |
//!
//! Fatal completion errors are returned to the caller instead.

use serde_json::Value;
use tracing::debug;

use crate::error::Result;
use crate::pipeline::batch::apply_model_fields;
use crate::pipeline::json::parse_model_json;
use crate::pipeline::prompts;
use crate::pipeline::retry::{degrade, with_retries, RetryPolicy};
use crate::traits::completion::{CompletionService, Stage};
use crate::types::chunk::Chunk;
use crate::types::requirement::{RecordSource, Requirement};

/// Extract requirement candidates from one chunk.
///
/// Every record is tagged `source = llm` and stamped with the chunk index.
/// Non-object array items are skipped.
pub async fn extract<C>(service: &C, chunk: &Chunk, policy: RetryPolicy) -> Result<Vec<Requirement>>
where
    C: CompletionService + ?Sized,
{
    let result = with_retries(policy, Stage::Extract, move |attempt| async move {
        let raw = service
            .complete(&prompts::extract_request(&chunk.text, attempt))
            .await?;
        parse_model_json(&raw).into_list(Stage::Extract)
    })
    .await;

    let items = degrade(Stage::Extract, result, Vec::new)?;
    let records: Vec<Requirement> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .map(|map| {
            let mut record = Requirement::from_json_map(map);
            // ids and adjudication flags are assigned by merge
            record.id = None;
            record.requires_adjudication = false;
            record.conflict_fields.clear();
            record.source = Some(RecordSource::Llm);
            record.chunk_index = Some(chunk.index);
            record
        })
        .collect();

    debug!(chunk = chunk.index, count = records.len(), "Extracted candidates");
    Ok(records)
}

/// Normalize category/modality of one record.
pub async fn classify<C>(service: &C, record: &Requirement, policy: RetryPolicy) -> Result<Requirement>
where
    C: CompletionService + ?Sized,
{
    let input = record.to_json_map();
    let input = &input;

    let result = with_retries(policy, Stage::Classify, move |attempt| async move {
        let raw = service
            .complete(&prompts::classify_request(input, attempt))
            .await?;
        parse_model_json(&raw).into_object(Stage::Classify)
    })
    .await
    .map(|output| {
        let mut classified = apply_model_fields(record, output);
        classified.classified = true;
        classified
    });

    degrade(Stage::Classify, result, || record.clone())
}

/// Attach precise evidence to one record from its chunk.
pub async fn ground<C>(
    service: &C,
    chunk: &Chunk,
    record: &Requirement,
    policy: RetryPolicy,
) -> Result<Requirement>
where
    C: CompletionService + ?Sized,
{
    let input = record.to_json_map();
    let input = &input;

    let result = with_retries(policy, Stage::Ground, move |attempt| async move {
        let raw = service
            .complete(&prompts::ground_request(&chunk.text, input, attempt))
            .await?;
        parse_model_json(&raw).into_object(Stage::Ground)
    })
    .await
    .map(|output| {
        let mut grounded = apply_model_fields(record, output);
        grounded.grounded = true;
        grounded
    });

    degrade(Stage::Ground, result, || record.clone())
}
