//! Requirement records - the central entity of the pipeline.
//!
//! Records start life as loosely-shaped JSON (model output or regex hits),
//! gain fields as they move through classify/ground/score, and end up as
//! canonical records with aggregated citations after merge.
//!
//! Model output is never trusted to be well-typed, so conversion from JSON
//! is lenient: numbers may arrive as strings, unknown categories are kept,
//! and every field the pipeline does not recognize survives in `extra`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Positional index added to records for batched calls.
pub const IDX_KEY: &str = "_idx";

/// Chunk-group origin marker carried through batched calls.
pub const CHUNK_KEY: &str = "_chunk";

static RE_MODALITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(shall\s+not|must\s+not|may\s+not|shall|must|should|may|will|required|prohibited)\b",
    )
    .unwrap()
});

// =============================================================================
// Category
// =============================================================================

/// Requirement category.
///
/// The five base categories come from extraction; classification may assign a
/// label from the extended administrative taxonomy, which is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Technical,
    AdminFormat,
    Submission,
    Eligibility,
    Other,
    /// Extended taxonomy label such as "Evaluation & Award"
    Administrative(String),
}

impl Category {
    /// Base categories offered to the extract stage.
    pub const BASE: [Category; 5] = [
        Category::Technical,
        Category::AdminFormat,
        Category::Submission,
        Category::Eligibility,
        Category::Other,
    ];

    /// Parse a category label. Empty labels are absent.
    pub fn parse(label: &str) -> Option<Self> {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return None;
        }

        let squashed: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        Some(match squashed.as_str() {
            "technical" => Self::Technical,
            "adminformat" | "administrativeformat" | "format" | "formatting" => Self::AdminFormat,
            "submission" => Self::Submission,
            "eligibility" => Self::Eligibility,
            "other" => Self::Other,
            _ => Self::Administrative(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Technical => "Technical",
            Self::AdminFormat => "AdminFormat",
            Self::Submission => "Submission",
            Self::Eligibility => "Eligibility",
            Self::Other => "Other",
            Self::Administrative(label) => label,
        }
    }
}

impl From<String> for Category {
    fn from(label: String) -> Self {
        Self::parse(&label).unwrap_or(Self::Other)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Modality
// =============================================================================

/// Obligation strength of a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", from = "String")]
pub enum Modality {
    Shall,
    Must,
    Should,
    May,
    Will,
    Required,
    Prohibited,
    Unknown,
}

/// Coarse grouping of modalities used for conflict detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strength {
    Mandatory,
    Advisory,
    Permissive,
    Prohibited,
    Unknown,
}

impl Modality {
    /// Parse a modality label. Negated forms ("SHALL NOT") are prohibitions;
    /// unrecognized labels fall back to the first keyword inside them.
    pub fn parse(label: &str) -> Option<Self> {
        let upper = label
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        if upper.is_empty() {
            return None;
        }

        Some(match upper.as_str() {
            "SHALL" => Self::Shall,
            "MUST" => Self::Must,
            "SHOULD" => Self::Should,
            "MAY" => Self::May,
            "WILL" => Self::Will,
            "REQUIRED" | "REQUIRE" | "REQUIRES" => Self::Required,
            "PROHIBITED" | "PROHIBIT" | "SHALL NOT" | "MUST NOT" | "MAY NOT" => Self::Prohibited,
            "UNKNOWN" => Self::Unknown,
            _ => Self::detect(&upper).unwrap_or(Self::Unknown),
        })
    }

    /// First modality keyword in free text.
    pub fn detect(text: &str) -> Option<Self> {
        let keyword = RE_MODALITY.captures(text)?.get(1)?.as_str();
        let squashed = keyword.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(match squashed.to_ascii_lowercase().as_str() {
            "shall not" | "must not" | "may not" | "prohibited" => Self::Prohibited,
            "shall" => Self::Shall,
            "must" => Self::Must,
            "should" => Self::Should,
            "may" => Self::May,
            "will" => Self::Will,
            "required" => Self::Required,
            _ => Self::Unknown,
        })
    }

    pub fn strength(&self) -> Strength {
        match self {
            Self::Shall | Self::Must | Self::Required | Self::Will => Strength::Mandatory,
            Self::Should => Strength::Advisory,
            Self::May => Strength::Permissive,
            Self::Prohibited => Strength::Prohibited,
            Self::Unknown => Strength::Unknown,
        }
    }

    /// SHALL, MUST or REQUIRED.
    pub fn is_mandatory_keyword(&self) -> bool {
        matches!(self, Self::Shall | Self::Must | Self::Required)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shall => "SHALL",
            Self::Must => "MUST",
            Self::Should => "SHOULD",
            Self::May => "MAY",
            Self::Will => "WILL",
            Self::Required => "REQUIRED",
            Self::Prohibited => "PROHIBITED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for Modality {
    fn from(label: String) -> Self {
        Self::parse(&label).unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Source and citations
// =============================================================================

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    Regex,
    Llm,
}

impl RecordSource {
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "regex" => Some(Self::Regex),
            "llm" | "ai" | "model" => Some(Self::Llm),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Llm => "llm",
        }
    }
}

/// One piece of evidence for a canonical requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(default)]
    pub quote: String,
}

impl Citation {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            doc: obj.get("doc").and_then(as_text),
            page: obj.get("page").and_then(as_u32),
            section: obj.get("section").and_then(as_text),
            quote: obj.get("quote").and_then(as_text).unwrap_or_default(),
        })
    }
}

// =============================================================================
// Requirement
// =============================================================================

/// A requirement record.
///
/// `Deserialize` goes through [`Requirement::from_json_map`], so it accepts
/// whatever shape a model produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct Requirement {
    /// Stable synthetic identifier (assigned by merge)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Short human label
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modality: Option<Modality>,

    /// Verbatim or near-verbatim source text
    pub quote: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_start: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_end: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RecordSource>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_name: Option<String>,

    /// Set once classification succeeded
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub classified: bool,

    /// Set once grounding succeeded
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub grounded: bool,

    /// Aggregated citations (after merge)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Citation>,

    pub requires_adjudication: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflict_fields: Vec<String>,

    /// Index of the chunk the record was extracted from
    #[serde(rename = "_chunk", skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,

    /// Fields the pipeline does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const KNOWN_KEYS: &[&str] = &[
    "id",
    "label",
    "category",
    "modality",
    "quote",
    "section",
    "page_start",
    "page_end",
    "source",
    "confidence",
    "doc_name",
    "classified",
    "grounded",
    "sources",
    "requires_adjudication",
    "conflict_fields",
    CHUNK_KEY,
];

impl Requirement {
    /// Create a record from a quote.
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = Some(modality);
        self
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.section = Some(section.into());
        self
    }

    pub fn with_pages(mut self, start: u32, end: u32) -> Self {
        self.page_start = Some(start);
        self.page_end = Some(end);
        self
    }

    pub fn with_source(mut self, source: RecordSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_doc_name(mut self, doc_name: impl Into<String>) -> Self {
        self.doc_name = Some(doc_name.into());
        self
    }

    pub fn with_chunk_index(mut self, chunk_index: usize) -> Self {
        self.chunk_index = Some(chunk_index);
        self
    }

    /// Citation describing where this record came from.
    pub fn citation(&self) -> Citation {
        Citation {
            doc: self.doc_name.clone(),
            page: self.page_start,
            section: self.section.clone(),
            quote: self.quote.clone(),
        }
    }

    /// Whether the record carries the minimum fields to be kept.
    pub fn is_valid(&self) -> bool {
        !self.quote.trim().is_empty() && self.category.is_some() && self.modality.is_some()
    }

    /// Serialize into a JSON object.
    pub fn to_json_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    /// Build a record from a loosely-shaped JSON object.
    ///
    /// Numbers may be numeric strings; values that cannot be read are
    /// treated as absent. A bare `page` fills both page fields when
    /// `page_start` is missing.
    pub fn from_json_map(mut map: Map<String, Value>) -> Self {
        let mut page_start = map.get("page_start").and_then(as_u32);
        let mut page_end = map.get("page_end").and_then(as_u32);
        if page_start.is_none() {
            if let Some(page) = map.get("page").and_then(as_u32) {
                map.remove("page");
                page_start = Some(page);
                page_end = page_end.or(Some(page));
            }
        }

        let record = Self {
            id: map.get("id").and_then(as_text),
            label: map.get("label").and_then(as_text).unwrap_or_default(),
            category: map
                .get("category")
                .and_then(as_text)
                .and_then(|c| Category::parse(&c)),
            modality: map
                .get("modality")
                .and_then(as_text)
                .and_then(|m| Modality::parse(&m)),
            quote: map.get("quote").and_then(as_text).unwrap_or_default(),
            section: map.get("section").and_then(as_text),
            page_start,
            page_end,
            source: map
                .get("source")
                .and_then(as_text)
                .and_then(|s| RecordSource::parse(&s)),
            confidence: map.get("confidence").and_then(as_f64),
            doc_name: map.get("doc_name").and_then(as_text),
            classified: map.get("classified").and_then(as_bool).unwrap_or(false),
            grounded: map.get("grounded").and_then(as_bool).unwrap_or(false),
            sources: map
                .get("sources")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Citation::from_value).collect())
                .unwrap_or_default(),
            requires_adjudication: map
                .get("requires_adjudication")
                .and_then(as_bool)
                .unwrap_or(false),
            conflict_fields: map
                .get("conflict_fields")
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(as_text).collect())
                .unwrap_or_default(),
            chunk_index: map.get(CHUNK_KEY).and_then(as_index),
            extra: Map::new(),
        };

        for key in KNOWN_KEYS {
            map.remove(*key);
        }

        Self { extra: map, ..record }
    }
}

impl From<Map<String, Value>> for Requirement {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_json_map(map)
    }
}

// =============================================================================
// Lenient value readers
// =============================================================================

/// Read a string (or a scalar rendered as one). Blank strings are absent.
pub(crate) fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

pub(crate) fn as_u32(value: &Value) -> Option<u32> {
    let number = as_f64(value)?;
    (number >= 0.0 && number.fract() == 0.0 && number <= u32::MAX as f64).then_some(number as u32)
}

/// Read a non-negative integer index (`_idx`, `_chunk`).
pub(crate) fn as_index(value: &Value) -> Option<usize> {
    as_u32(value).map(|n| n as usize)
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
