//! Regex fast-path hits.

use serde::{Deserialize, Serialize};

use super::requirement::{Category, RecordSource};

/// Pattern family a regex hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Requirement,
    TimeRequirement,
    Performance,
    GovForm,
    SecurityStd,
    FedSystem,
    Labor,
    Deliverable,
    Cost,
    SectionRef,
    Deadline,
    QuestionsDue,
    PageLimit,
    LineSpacing,
    FontSpec,
    MarginSpec,
    FormatSpec,
    EmailSizeLimit,
    ZipProhibited,
    FileLabeling,
    SubmissionPortal,
    SubmissionEmailHint,
    Email,
    Volume,
    Tab,
    OralsPlatform,
    OralsDuration,
    OralsHeadcount,
    OralsProhibition,
    EvalCriteria,
    Cdrl,
    DiNumber,
    ReviewMeeting,
    FarDfars,
    ContractType,
    Naics,
    Psc,
    PlaceOfPerformance,
    PeriodOfPerformance,
    Travel,
    KeyPersonnel,
    QuoteValidityDays,
}

impl HitKind {
    /// Default requirement category for records built from this kind of hit.
    pub fn category(&self) -> Category {
        use HitKind::*;
        match self {
            Deadline | QuestionsDue | SubmissionPortal | SubmissionEmailHint | Email
            | FileLabeling | EmailSizeLimit | ZipProhibited => Category::Submission,
            PageLimit | LineSpacing | FontSpec | MarginSpec | FormatSpec | Volume | Tab => {
                Category::AdminFormat
            }
            Naics | Psc | ContractType | FarDfars => Category::Eligibility,
            SecurityStd | Performance | Deliverable | Cdrl | DiNumber | ReviewMeeting | Labor
            | KeyPersonnel => Category::Technical,
            _ => Category::Other,
        }
    }

    /// Kinds whose very short matches are noise.
    pub fn drops_short_matches(&self) -> bool {
        matches!(self, Self::Requirement | Self::FedSystem)
    }
}

/// One pattern match from the fast path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexHit {
    /// Pattern family
    pub kind: HitKind,

    /// Matched text (sentence scope for modality hits, at most 500 chars)
    #[serde(rename = "match")]
    pub matched: String,

    /// Normalized value (page count, date, font spec, ...)
    pub value: Option<String>,

    /// Section of the chunk the hit came from
    pub section: String,

    pub start_page: u32,
    pub end_page: u32,

    /// Always [`RecordSource::Regex`]
    pub source: RecordSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_categories() {
        assert_eq!(HitKind::Deadline.category(), Category::Submission);
        assert_eq!(HitKind::FontSpec.category(), Category::AdminFormat);
        assert_eq!(HitKind::Naics.category(), Category::Eligibility);
        assert_eq!(HitKind::Travel.category(), Category::Other);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&HitKind::QuoteValidityDays).unwrap();
        assert_eq!(json, "\"quote_validity_days\"");
    }
}
