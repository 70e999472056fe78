//! LLM prompts for the extraction stages.
//!
//! Each stage sends fixed instructions plus a per-call input (chunk text or
//! record JSON). Retries append a stricter suffix to the input.

use serde_json::{Map, Value};

use crate::traits::completion::{CompletionRequest, Stage};

/// Extended administrative taxonomy offered to the classify stages.
pub const TAXONOMY: &[&str] = &[
    "Submission",
    "Eligibility & Set-Asides",
    "Contract Type & Terms",
    "Pricing & Payment",
    "Evaluation & Award",
    "Technical Approach & Capability",
    "Management & Staffing",
    "Personnel & Qualifications",
    "Security (Personnel & Facility)",
    "Privacy & Data Protection",
    "Compliance & Regulatory",
    "Flowdowns & Subcontracting",
    "Performance & Deliverables",
    "Schedule & Milestones",
    "Quality Assurance",
    "Operations & Sustainment",
    "Supply Chain & Property Management",
    "Customer Service & Communications",
    "Training & Workforce Development",
    "Risk Management & Oversight Authority",
    "Technology",
    "Accessibility Sustainability",
    "General Administrative",
];

/// Prompt for extracting requirements from one chunk.
pub const EXTRACT_PROMPT: &str = r#"Given solicitation chunk text, return a JSON array of requirement objects.

A requirement is any contract-like obligation or request in the government
proposal documents that a contractor responding to the solicitation must address.

Each object:
{
    "label": "short human label",
    "category": "Technical" | "AdminFormat" | "Submission" | "Eligibility" | "Other",
    "modality": "SHALL" | "MUST" | "SHOULD" | "MAY" | "WILL" | "REQUIRED" | "PROHIBITED",
    "quote": "verbatim text from the chunk",
    "section": "section heading if known",
    "page_start": number,
    "page_end": number
}

Only return JSON."#;

/// Prompt for normalizing one requirement object.
pub const CLASSIFY_PROMPT: &str = r#"Normalize a single requirement object: ensure category and modality.

Give the requirement a category from this list:
{taxonomy}

Modality is one of SHALL, MUST, SHOULD, MAY, WILL, REQUIRED, PROHIBITED.

Input: one requirement JSON object. Output: the corrected object (JSON)."#;

/// Prompt for attaching evidence to one requirement.
pub const GROUND_PROMPT: &str = r#"Given a requirement object and the chunk text it came from, return exact evidence.

Refine the quote so it is verbatim from the chunk, include start/end character
offsets for the quote, and refine page_start, page_end and section if needed.

Output: the grounded requirement object (JSON)."#;

/// Prompt for classifying many requirements in one call.
pub const BATCH_CLASSIFY_PROMPT: &str = r#"Classify many requirements. Ensure category and modality for each one.

Give each requirement a category from this list:
{taxonomy}

Input: JSON array of requirement objects.
For each input object, return ONE classified object in the SAME order, and
include the `_idx` field UNCHANGED so results can be matched back.
Return ONLY a JSON array. No prose."#;

/// Prompt for grounding many requirements from the same chunk.
pub const BATCH_GROUND_PROMPT: &str = r#"Use the provided chunk text to ground each requirement (provide page, quote and section if applicable).

Input: JSON array of requirement objects that all came from this chunk.
For EVERY input object, return ONE grounded object in the SAME order and
include `_idx` unchanged.
Return ONLY a JSON array. No prose."#;

/// Appended to the input when a list-shaped response has to be retried.
pub const STRICT_LIST_SUFFIX: &str =
    "Return ONLY a JSON array of requirement objects. Use strictly valid JSON (double-quoted keys/strings). No prose.";

/// Appended to the input when an object-shaped response has to be retried.
pub const STRICT_OBJECT_SUFFIX: &str =
    "Return ONLY a JSON object for the requirement. Use strictly valid JSON (double-quoted keys/strings). No prose.";

/// Instructions for a stage.
pub fn instructions(stage: Stage) -> String {
    match stage {
        Stage::Extract => EXTRACT_PROMPT.to_string(),
        Stage::Classify => CLASSIFY_PROMPT.replace("{taxonomy}", &taxonomy_list()),
        Stage::Ground => GROUND_PROMPT.to_string(),
        Stage::BatchClassify => BATCH_CLASSIFY_PROMPT.replace("{taxonomy}", &taxonomy_list()),
        Stage::BatchGround => BATCH_GROUND_PROMPT.to_string(),
    }
}

/// Append the strict-JSON suffix on retries.
pub fn strengthen(stage: Stage, input: &str, attempt: u32) -> String {
    if attempt == 0 {
        return input.to_string();
    }
    let suffix = if stage.expects_list() {
        STRICT_LIST_SUFFIX
    } else {
        STRICT_OBJECT_SUFFIX
    };
    format!("{}\n\n{}", input, suffix)
}

/// Build the extract request for a chunk.
pub fn extract_request(chunk_text: &str, attempt: u32) -> CompletionRequest {
    CompletionRequest::new(
        Stage::Extract,
        instructions(Stage::Extract),
        strengthen(Stage::Extract, chunk_text, attempt),
    )
}

/// Build the classify request for one record.
pub fn classify_request(record: &Map<String, Value>, attempt: u32) -> CompletionRequest {
    let input = Value::Object(record.clone()).to_string();
    CompletionRequest::new(
        Stage::Classify,
        instructions(Stage::Classify),
        strengthen(Stage::Classify, &input, attempt),
    )
}

/// Build the ground request for one record and its chunk.
pub fn ground_request(chunk_text: &str, record: &Map<String, Value>, attempt: u32) -> CompletionRequest {
    let input = Value::Object(record.clone()).to_string();
    CompletionRequest::new(
        Stage::Ground,
        instructions(Stage::Ground),
        strengthen(Stage::Ground, &input, attempt),
    )
    .with_context(chunk_text)
}

/// Build a batched request. `context` carries the chunk for grounding.
pub fn batch_request(stage: Stage, payload: &[Value], context: Option<&str>) -> CompletionRequest {
    let input = Value::Array(payload.to_vec()).to_string();
    let request = CompletionRequest::new(stage, instructions(stage), input);
    match context {
        Some(text) => request.with_context(text),
        None => request,
    }
}

fn taxonomy_list() -> String {
    format!("{{{}}}", TAXONOMY.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::requirement::Category;
    use serde_json::json;

    #[test]
    fn test_extract_prompt_lists_base_categories() {
        let prompt = instructions(Stage::Extract);
        for category in Category::BASE {
            assert!(prompt.contains(category.as_str()), "missing {}", category);
        }
    }

    #[test]
    fn test_classify_prompts_carry_taxonomy() {
        for stage in [Stage::Classify, Stage::BatchClassify] {
            let prompt = instructions(stage);
            assert!(prompt.contains("Evaluation & Award"));
            assert!(prompt.contains("General Administrative"));
            assert!(!prompt.contains("{taxonomy}"));
        }
    }

    #[test]
    fn test_batch_prompts_demand_index_echo() {
        assert!(instructions(Stage::BatchClassify).contains("`_idx`"));
        assert!(instructions(Stage::BatchGround).contains("`_idx`"));
    }

    #[test]
    fn test_strengthen_only_on_retry() {
        assert_eq!(strengthen(Stage::Extract, "text", 0), "text");

        let retry = strengthen(Stage::Extract, "text", 1);
        assert!(retry.starts_with("text\n\n"));
        assert!(retry.ends_with(STRICT_LIST_SUFFIX));

        let retry = strengthen(Stage::Ground, "{}", 2);
        assert!(retry.ends_with(STRICT_OBJECT_SUFFIX));
    }

    #[test]
    fn test_object_suffix_fits_classify_and_ground() {
        for stage in [Stage::Classify, Stage::Ground] {
            let retry = strengthen(stage, "{}", 1);
            assert!(retry.ends_with(STRICT_OBJECT_SUFFIX));
            assert!(!retry.contains("grounded"));
            assert!(!retry.contains("classified"));
        }
    }

    #[test]
    fn test_ground_request_carries_chunk() {
        let record = json!({"quote": "q"}).as_object().cloned().unwrap();
        let request = ground_request("chunk text", &record, 0);
        assert_eq!(request.stage, Stage::Ground);
        assert_eq!(request.context.as_deref(), Some("chunk text"));
        assert_eq!(request.input, r#"{"quote":"q"}"#);
    }

    #[test]
    fn test_batch_request_payload_is_array() {
        let request = batch_request(Stage::BatchClassify, &[json!({"_idx": 0})], None);
        assert_eq!(request.input, r#"[{"_idx":0}]"#);
        assert!(request.context.is_none());
    }
}
