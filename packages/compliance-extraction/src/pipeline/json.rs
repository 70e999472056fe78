//! Robust JSON recovery from raw model output.
//!
//! Models wrap payloads in prose and code fences. Parsing tries, in order:
//! the whole text, a fenced ```json block, any fenced block, then the span
//! from the first opening bracket to the last matching closing bracket.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ExtractionError, Result};
use crate::traits::completion::Stage;

static RE_JSON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)```json\s*(.+?)\s*```").unwrap());

static RE_ANY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.+?)\s*```").unwrap());

/// Key some models use to wrap an extraction list in an object.
const LIST_WRAPPER_KEY: &str = "requirements";

/// Outcome of parsing model output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedJson {
    List(Vec<Value>),
    Object(Map<String, Value>),
    /// No structured JSON could be recovered
    Failure(String),
}

impl ParsedJson {
    /// Require a JSON array.
    ///
    /// An object wrapping the list under `requirements` is accepted.
    pub fn into_list(self, stage: Stage) -> Result<Vec<Value>> {
        match self {
            Self::List(items) => Ok(items),
            Self::Object(mut map) => match map.remove(LIST_WRAPPER_KEY) {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(ExtractionError::UnexpectedShape {
                    stage,
                    expected: "array",
                }),
            },
            Self::Failure(reason) => Err(ExtractionError::MalformedResponse { stage, reason }),
        }
    }

    /// Require a JSON object.
    pub fn into_object(self, stage: Stage) -> Result<Map<String, Value>> {
        match self {
            Self::Object(map) => Ok(map),
            Self::List(_) => Err(ExtractionError::UnexpectedShape {
                stage,
                expected: "object",
            }),
            Self::Failure(reason) => Err(ExtractionError::MalformedResponse { stage, reason }),
        }
    }
}

/// Recover a JSON array or object from raw model text.
pub fn parse_model_json(raw: &str) -> ParsedJson {
    let raw = raw.trim();
    if raw.is_empty() {
        return ParsedJson::Failure("empty response".into());
    }

    if let Some(parsed) = parse_structured(raw) {
        return parsed;
    }

    for fence in [&RE_JSON_FENCE, &RE_ANY_FENCE] {
        if let Some(body) = fence.captures(raw).and_then(|c| c.get(1)) {
            if let Some(parsed) = parse_structured(body.as_str()) {
                return parsed;
            }
        }
    }

    if let Some(parsed) = bracket_span(raw) {
        return parsed;
    }

    ParsedJson::Failure("no JSON array or object found in response".into())
}

fn parse_structured(text: &str) -> Option<ParsedJson> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(ParsedJson::List(items)),
        Value::Object(map) => Some(ParsedJson::Object(map)),
        _ => None,
    }
}

/// First opening bracket to last matching closing bracket, trying the
/// bracket kind that opens first before the other one.
fn bracket_span(raw: &str) -> Option<ParsedJson> {
    let first_object = raw.find('{');
    let first_array = raw.find('[');

    let mut kinds = [('{', '}', first_object), ('[', ']', first_array)];
    if first_array.unwrap_or(usize::MAX) < first_object.unwrap_or(usize::MAX) {
        kinds.swap(0, 1);
    }

    kinds.into_iter().find_map(|(_, close, start)| {
        let start = start?;
        let end = raw.rfind(close)?;
        (end > start)
            .then(|| &raw[start..=end])
            .and_then(parse_structured)
    })
}
