//! Batched Classify/Ground with index alignment.
//!
//! Every input record is tagged with its position (`_idx`) before the call.
//! The model is asked to echo that index, but may reorder, drop, or mangle
//! entries, so results are re-associated by [`align_batch`] and merged onto
//! copies of the originals instead of replacing them. Bookkeeping fields such
//! as the chunk origin marker survive the round-trip.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::json::parse_model_json;
use crate::pipeline::prompts;
use crate::pipeline::retry::{degrade, with_retries, RetryPolicy};
use crate::traits::completion::{CompletionService, Stage};
use crate::types::chunk::Chunk;
use crate::types::requirement::{as_index, Requirement, CHUNK_KEY, IDX_KEY};

/// Keys the model may never overwrite. Adjudication flags belong to merge.
const PROTECTED_KEYS: &[&str] = &[
    IDX_KEY,
    CHUNK_KEY,
    "id",
    "source",
    "classified",
    "grounded",
    "sources",
    "requires_adjudication",
    "conflict_fields",
];

/// A model output re-associated with the input it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    /// Position of the original record in the batch
    pub index: usize,

    /// Original record with the model's fields applied
    pub record: Requirement,
}

/// Lift every leaf of nested objects to the top level.
///
/// Later keys win on collision; arrays are kept as values.
pub fn flatten_object(map: Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    flatten_into(map, &mut flat);
    flat
}

fn flatten_into(map: Map<String, Value>, flat: &mut Map<String, Value>) {
    for (key, value) in map {
        match value {
            Value::Object(inner) => flatten_into(inner, flat),
            other => {
                flat.insert(key, other);
            }
        }
    }
}

/// Overlay a model's output onto a copy of the original record.
///
/// Model fields take precedence, except protected bookkeeping keys and
/// null/blank values, which never erase what the record already has. A bare
/// `page` from the model sets both page fields.
pub fn apply_model_fields(original: &Requirement, output: Map<String, Value>) -> Requirement {
    let mut fields = flatten_object(output);

    if let Some(page) = fields.remove("page") {
        if !fields.contains_key("page_start") {
            fields.insert("page_start".into(), page.clone());
        }
        if !fields.contains_key("page_end") {
            fields.insert("page_end".into(), page);
        }
    }

    let mut merged = original.to_json_map();
    for (key, value) in fields {
        if PROTECTED_KEYS.contains(&key.as_str()) || is_absent(&value) {
            continue;
        }
        merged.insert(key, value);
    }

    Requirement::from_json_map(merged)
}

fn is_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Re-associate batch outputs with their inputs.
///
/// Echoed indices (numbers or numeric strings, in range) are claimed first.
/// Outputs without a usable echo fall back to their position if that index
/// is still free. Duplicate claims and non-object outputs are dropped.
/// Results come back in input order and may be fewer than the inputs.
pub fn align_batch(originals: &[Requirement], outputs: Vec<Value>) -> Vec<AlignedRecord> {
    let size = originals.len();
    let mut slots: Vec<Option<Map<String, Value>>> = vec![None; size];
    let mut unindexed = Vec::new();

    for (position, output) in outputs.into_iter().enumerate() {
        let Value::Object(map) = output else {
            debug!(position, "Dropping non-object batch output");
            continue;
        };

        match map.get(IDX_KEY).and_then(as_index).filter(|i| *i < size) {
            Some(index) if slots[index].is_none() => slots[index] = Some(map),
            Some(index) => debug!(index, position, "Dropping duplicate batch index"),
            None => unindexed.push((position, map)),
        }
    }

    for (position, map) in unindexed {
        if position < size && slots[position].is_none() {
            slots[position] = Some(map);
        } else {
            debug!(position, "Dropping batch output with no free index");
        }
    }

    slots
        .into_iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let output = slot?;
            let mut record = apply_model_fields(&originals[index], output);
            record.extra.insert(IDX_KEY.into(), Value::from(index));
            Some(AlignedRecord { index, record })
        })
        .collect()
}

/// Classify a batch of records in one call.
///
/// On total failure the call is retried per `policy`; if that fails too the
/// batch is lost and an empty list comes back.
pub async fn batch_classify<C>(
    service: &C,
    records: &[Requirement],
    policy: RetryPolicy,
) -> Result<Vec<AlignedRecord>>
where
    C: CompletionService + ?Sized,
{
    let mut aligned = run_batch(service, Stage::BatchClassify, records, None, policy).await?;
    for item in &mut aligned {
        item.record.classified = true;
    }
    Ok(aligned)
}

/// Ground a batch of records that all came from `chunk`.
pub async fn batch_ground<C>(
    service: &C,
    chunk: &Chunk,
    records: &[Requirement],
    policy: RetryPolicy,
) -> Result<Vec<AlignedRecord>>
where
    C: CompletionService + ?Sized,
{
    let mut aligned =
        run_batch(service, Stage::BatchGround, records, Some(&chunk.text), policy).await?;
    for item in &mut aligned {
        item.record.grounded = true;
    }
    Ok(aligned)
}

async fn run_batch<C>(
    service: &C,
    stage: Stage,
    records: &[Requirement],
    context: Option<&str>,
    policy: RetryPolicy,
) -> Result<Vec<AlignedRecord>>
where
    C: CompletionService + ?Sized,
{
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let payload: Vec<Value> = records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let mut map = record.to_json_map();
            map.insert(IDX_KEY.into(), Value::from(index));
            Value::Object(map)
        })
        .collect();
    let request = prompts::batch_request(stage, &payload, context);
    let request = &request;

    let result = with_retries(policy, stage, move |_| async move {
        let raw = service.complete(request).await?;
        let outputs = parse_model_json(&raw).into_list(stage)?;
        Ok(align_batch(records, outputs))
    })
    .await;

    let aligned = degrade(stage, result, Vec::new)?;
    if aligned.len() < records.len() {
        warn!(
            stage = %stage,
            sent = records.len(),
            recovered = aligned.len(),
            "Batch returned fewer records than sent"
        );
    } else {
        debug!(stage = %stage, count = aligned.len(), "Batch aligned");
    }

    Ok(aligned)
}
