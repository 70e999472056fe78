//! Regex fast path - zero-LLM candidate requirements.
//!
//! An ordered library of independent matchers (modality sentences,
//! deadlines, Section L formatting rules, submission channels, clause
//! references, codes, ...). Every matcher runs over the full chunk text and
//! matches are not mutually exclusive. This complements LLM extraction; it
//! does not replace it.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Match, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::chunk::Chunk;
use crate::types::hit::{HitKind, RegexHit};
use crate::types::requirement::{Modality, RecordSource, Requirement};

/// Longest match text kept on a hit.
const MAX_MATCH_CHARS: usize = 500;

/// Shortest `requirement`/`fed_system` match worth keeping.
const MIN_NOISY_MATCH_CHARS: usize = 10;

/// Chars of the match used for the dedupe key and record label.
const KEY_CHARS: usize = 120;

/// Chars scanned past a modality keyword when its sentence never ends.
const SENTENCE_FALLBACK_CHARS: usize = 200;

// =============================================================================
// Shared fragments
// =============================================================================

const MONTH: &str = r"(?:Jan(?:uary)?|Feb(?:ruary)?|Mar(?:ch)?|Apr(?:il)?|May|June?|July?|Aug(?:ust)?|Sep(?:t(?:ember)?)?|Oct(?:ober)?|Nov(?:ember)?|Dec(?:ember)?)";

const TIME: &str =
    r"(?:\b\d{1,2}(?::\d{2})?\s?(?:a\.m\.|p\.m\.|(?:am|pm)\b)|\bEOD\b|\bCOB\b)";

const TZ: &str = r"(?:\b(?:ET|EST|EDT|CT|CST|CDT|MT|MST|MDT|PT|PST|PDT|UTC|GMT)\b|\b(?:Eastern|Central|Mountain|Pacific)\s+(?:(?:Standard|Daylight)\s+)?Time\b)";

const NLT: &str = r"(?:no\s+later\s+than|not\s+later\s+than|nlt|by|before|due|deadline|submit(?:ted)?)";

const EMAIL: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// Numeric (08/31/2025, 2025-08-31) or spelled (August 31, 2025 / 31 Aug 2025) dates.
fn date_pattern() -> String {
    format!(
        r"(?:\b\d{{1,4}}[/-]\d{{1,2}}[/-]\d{{2,4}}\b|\b{MONTH}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}\b|\b\d{{1,2}}(?:st|nd|rd|th)?\s+{MONTH}\.?,?\s+\d{{4}}\b)"
    )
}

fn build(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

// =============================================================================
// Patterns
// =============================================================================

static RE_DATE: LazyLock<Regex> = LazyLock::new(|| build(&format!("(?i){}", date_pattern())));

static RE_REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:MUST\s+NOT|SHALL\s+NOT|SHALL|MUST|SHOULD|MAY|WILL|REQUIRED?|PROHIBITED?)\b[^.!?]*")
});

static RE_TIME_REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:within|no\s+later\s+than|not\s+later\s+than|NLT|prior\s+to|before|after)\s+\d+\s*(?:calendar|business|working)?\s*(?:days?|months?|years?|hours?)\b")
});

static RE_PERFORMANCE: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b\d+\s*(?:%|percent)\s+(?:accuracy|completion|standard|requirement|or\s+(?:higher|greater|more|less))")
});

static RE_GOV_FORM: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:DHS|CBP|OPM|GSA|NIST|FIPS|OMB)\s*(?:Form|Publication|Directive|Handbook|MD|M-|SP)?\s*[\d\-A-Z]+")
});

static RE_SECURITY_STD: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:FISMA|FIPS\s*\d+|NIST(?:\s*SP)?\s*\d+(?:-\d+)?|Section\s*508|HSPD-12|PIV|ISO\s*\d{3,5}|AS9100|CMMI|FedRAMP|SOC\s*\d|SSBI|AES\s*\d+|SHA-\d+|TLS\s*\d+(?:\.\d+)?)\b")
});

static RE_FED_SYSTEM: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:CSRS|FERS|TSP|FEHB|FEGLI|COPRA|LEO|CBPO|OPM|GSA|FTR|Federal\s+Travel\s+Regulations?|Thrift\s+Savings\s+Plan|Federal\s+Employees?.{0,20}(?:Retirement|Health|Insurance))\b")
});

static RE_LABOR: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:FTEs?|Full[- ]Time\s+Equivalents?|labor\s+categor(?:y|ies)|(?:Senior|Junior|Journeyman)\s+(?:HCATS|position)|\d+\s*(?:FTEs?|positions?|personnel|employees?))\b")
});

static RE_DELIVERABLE: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:deliverables?|monthly\s+status\s+reports?|MSR|QCP|Quality\s+Control\s+Plan|Transition[- ](?:In|Out)\s+Plan|Non-?Disclosure\s+Agreement|NDA)\b")
});

static RE_COST: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\$[\d,]+(?:\.\d{2})?|\b\d+\s*(?:hours?/FTE|hours?\s+per|hourly\s+rate)\b")
});

static RE_SECTION_REF: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)(?:\bSection|\bSec\.?|§)\s*\d+(?:\.\d+)*"));

static RE_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    build(&format!(
        r"(?is)\b(?:due|submit(?:ted)?|deadline|{NLT})\b.*?(?P<date>{date})(?:\s*(?:at|by)\s*(?P<time>{TIME}))?(?:\s*(?P<tz>{TZ}))?",
        date = date_pattern()
    ))
});

static RE_QUESTIONS: LazyLock<Regex> = LazyLock::new(|| {
    build(&format!(
        r"(?is)\b(?:questions?|clarifications?)\b.*?\b{NLT}\b\s*(?P<date>{date})(?:\s*(?:at|by)\s*(?P<time>{TIME}))?(?:\s*(?P<tz>{TZ}))?",
        date = date_pattern()
    ))
});

static RE_PAGE_LIMIT: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:page(?:\s+count)?\s*(?:limit|maximum)|(?:shall\s+)?not\s+exceed|no\s+more\s+than)\s*(?:of\s+|is\s+|:\s*)?(?P<pages>\d{1,4})\s*(?:pages?|pgs?|slides?)\b")
});

static RE_LINE_SPACING: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?P<spacing>single[- ]?spaced|double[- ]?spaced|1\.5[- ]?spaced)\b")
});

static RE_FONT: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:(?P<family>Times\s+New\s+Roman|Arial|Calibri)[^.\n]{0,40}?\b(?P<size>\d{1,2})[\s-]*(?:pt|point)s?\b|font\s+size\s*(?:of\s+)?(?P<size2>\d{1,2})[\s-]*(?:pt|point)s?\b|(?P<size3>\d{1,2})[\s-]*(?:pt|point)s?\s+(?P<family2>Times\s+New\s+Roman|Arial|Calibri)\b)")
});

static RE_MARGIN: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\bmargins?\s*(?:of|:)?\s*(?P<marg>0?\.\d+|\d(?:\.\d+)?)[\s-]*(?:inch(?:es)?|in)\b")
});

static RE_FORMAT: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?P<fmt>searchable\s+PDF|native\s+format|PDF|MS\s*Word|Word|Excel|PowerPoint|PPTX)\b")
});

static RE_EMAIL_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:e-?mail|attachment)\s+(?:size|limit)\s+(?:is|of|shall\s+be|must\s+be|may\s+not\s+exceed|cannot\s+exceed)\s+(?P<mb>\d{1,3})\s*MB\b")
});

static RE_ZIP_PROHIBITED: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)(?:\bZIP|\.zip)\s+(?:files?\s+)?(?:are\s+|is\s+)?(?:not\s+permitted|not\s+allowed|prohibited|disallowed)\b")
});

static RE_LABELING: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:label(?:ed|led|ing|ling)?|file\s*name|file\s*naming|subject\s*line)\b[^.\n]{0,160}")
});

static RE_SUBMIT_PORTAL: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:submit(?:ted)?|upload(?:ed)?)\s+(?:electronically\s+)?(?:via|through|to|in)\s+(?:the\s+)?(?P<portal>SAM\.gov|PIEE|WAWF|e[- ]?Buy|Grants\.gov|FedConnect|Seaport[- ]?NxG|DoD\s*SAFE|SharePoint|portal)\b")
});

static RE_SUBMIT_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    build(&format!(r"(?is)\b{NLT}\b.{{0,120}}?(?P<email>{EMAIL})"))
});

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| build(&format!(r"(?P<email>{EMAIL})")));

static RE_VOLUME: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\bVol(?:ume)?\.?\s*(?P<vol>\d+|[IVXLC]+)\b"));

static RE_TAB: LazyLock<Regex> = LazyLock::new(|| build(r"(?i)\bTab\s*(?P<tab>[A-Z]|\d+)\b"));

static RE_ORALS_PLATFORM: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\b(?:Microsoft\s*Teams|Webex|Zoom|in[- ]?person)\b"));

static RE_ORALS_DURATION: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\b(?P<num>\d{1,3})\s*(?:minutes?|mins?)\b"));

static RE_ORALS_HEADCOUNT: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:max(?:imum)?\s*(?:of\s+)?)?(?:presenters?|participants?|attendees?)\s*(?:is|are|shall\s+be|limited\s+to)?\s*(?P<n>\d+)\b")
});

static RE_ORALS_PROHIBITION: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:no\s+recording|recording\s+is\s+prohibited|price\s+content\s+(?:is\s+)?prohibited)\b")
});

static RE_EVAL_CRITERIA: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?is)\b(?:evaluation|scoring|weight(?:ed|ing)?|rated?|technical\s+(?:factor|criteria)|factors?\s+(?:are|is))\b.*?(?P<weight>\d+\s*(?:points?|%|percent))")
});

static RE_CDRL: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\bCDRLs?\b|\bContract\s+Data\s+Requirements\s+List\b"));

static RE_DI_NUMBER: LazyLock<Regex> = LazyLock::new(|| build(r"(?i)\bDI-[A-Z]{2,4}-\d{3,6}\b"));

static RE_REVIEW: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:SRR|PDR|CDR|PMR|IBR|TIM|FRR|KDP|kick[- ]?off|status\s+review|design\s+review)\b")
});

static RE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:FAR|DFARS)\s*(?:52\.\d{3}-\d{1,4}|\d{2,3}\.\d{3}(?:-\d{1,4})?)\b")
});

static RE_CONTRACT_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:FFP|Firm[-\s]?Fixed[-\s]?Price|T&M|Time[-\s]?and[-\s]?Materials|CPFF|Cost[-\s]?Plus[-\s]?Fixed[-\s]?Fee|IDIQ|BPA|BOA)\b")
});

static RE_NAICS: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\bNAICS\b[^0-9]{0,10}(?P<naics>\d{6})\b"));

static RE_PSC: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\bPSC\b[^A-Z0-9]{0,10}(?P<psc>[A-Z]\d{3})\b"));

static RE_PLACE: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:Place\s+of\s+Performance|PoP\s+Location|performance\s+will\s+be\s+at)\b[^.\n]{0,200}")
});

static RE_PERIOD: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\b(?:Period\s+of\s+Performance|PoP)\b[^.\n]{0,160}"));

static RE_TRAVEL: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\btravel\b[^.\n]{0,120}\b(?:reimburs\w*|in[- ]?accordance|per\s+diem|JTR|local|non[- ]?local)\b")
});

static RE_KEY_PERSONNEL: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\bkey\s+personnel\b[^.\n]{0,200}"));

static RE_VALIDITY: LazyLock<Regex> = LazyLock::new(|| {
    build(r"(?i)\b(?:offers?|quotes?|quotations?|proposals?)\s+(?:(?:shall|must|will)\s+)?(?:remain\s+)?valid\s+for\s+(?:a\s+(?:minimum\s+of\s+)?|at\s+least\s+)?(?P<days>\d{1,4})\s+(?:calendar\s+)?days\b")
});

static RE_SUMMARY_MODALITY: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\b(shall|must|should|may)\b"));

static RE_SUMMARY_DELIVERABLE: LazyLock<Regex> =
    LazyLock::new(|| build(r"(?i)\bdeliverable\b"));

struct Pattern {
    kind: HitKind,
    regex: &'static LazyLock<Regex>,
}

/// Evaluation order of the pattern library.
static PATTERNS: &[Pattern] = &[
    Pattern { kind: HitKind::Requirement, regex: &RE_REQUIREMENT },
    Pattern { kind: HitKind::TimeRequirement, regex: &RE_TIME_REQUIREMENT },
    Pattern { kind: HitKind::Performance, regex: &RE_PERFORMANCE },
    Pattern { kind: HitKind::GovForm, regex: &RE_GOV_FORM },
    Pattern { kind: HitKind::SecurityStd, regex: &RE_SECURITY_STD },
    Pattern { kind: HitKind::FedSystem, regex: &RE_FED_SYSTEM },
    Pattern { kind: HitKind::Labor, regex: &RE_LABOR },
    Pattern { kind: HitKind::Deliverable, regex: &RE_DELIVERABLE },
    Pattern { kind: HitKind::Cost, regex: &RE_COST },
    Pattern { kind: HitKind::SectionRef, regex: &RE_SECTION_REF },
    Pattern { kind: HitKind::Deadline, regex: &RE_DEADLINE },
    Pattern { kind: HitKind::QuestionsDue, regex: &RE_QUESTIONS },
    Pattern { kind: HitKind::PageLimit, regex: &RE_PAGE_LIMIT },
    Pattern { kind: HitKind::LineSpacing, regex: &RE_LINE_SPACING },
    Pattern { kind: HitKind::FontSpec, regex: &RE_FONT },
    Pattern { kind: HitKind::MarginSpec, regex: &RE_MARGIN },
    Pattern { kind: HitKind::FormatSpec, regex: &RE_FORMAT },
    Pattern { kind: HitKind::EmailSizeLimit, regex: &RE_EMAIL_SIZE },
    Pattern { kind: HitKind::ZipProhibited, regex: &RE_ZIP_PROHIBITED },
    Pattern { kind: HitKind::FileLabeling, regex: &RE_LABELING },
    Pattern { kind: HitKind::SubmissionPortal, regex: &RE_SUBMIT_PORTAL },
    Pattern { kind: HitKind::SubmissionEmailHint, regex: &RE_SUBMIT_EMAIL },
    Pattern { kind: HitKind::Email, regex: &RE_EMAIL },
    Pattern { kind: HitKind::Volume, regex: &RE_VOLUME },
    Pattern { kind: HitKind::Tab, regex: &RE_TAB },
    Pattern { kind: HitKind::OralsPlatform, regex: &RE_ORALS_PLATFORM },
    Pattern { kind: HitKind::OralsDuration, regex: &RE_ORALS_DURATION },
    Pattern { kind: HitKind::OralsHeadcount, regex: &RE_ORALS_HEADCOUNT },
    Pattern { kind: HitKind::OralsProhibition, regex: &RE_ORALS_PROHIBITION },
    Pattern { kind: HitKind::EvalCriteria, regex: &RE_EVAL_CRITERIA },
    Pattern { kind: HitKind::Cdrl, regex: &RE_CDRL },
    Pattern { kind: HitKind::DiNumber, regex: &RE_DI_NUMBER },
    Pattern { kind: HitKind::ReviewMeeting, regex: &RE_REVIEW },
    Pattern { kind: HitKind::FarDfars, regex: &RE_CLAUSE },
    Pattern { kind: HitKind::ContractType, regex: &RE_CONTRACT_TYPE },
    Pattern { kind: HitKind::Naics, regex: &RE_NAICS },
    Pattern { kind: HitKind::Psc, regex: &RE_PSC },
    Pattern { kind: HitKind::PlaceOfPerformance, regex: &RE_PLACE },
    Pattern { kind: HitKind::PeriodOfPerformance, regex: &RE_PERIOD },
    Pattern { kind: HitKind::Travel, regex: &RE_TRAVEL },
    Pattern { kind: HitKind::KeyPersonnel, regex: &RE_KEY_PERSONNEL },
    Pattern { kind: HitKind::QuoteValidityDays, regex: &RE_VALIDITY },
];

// =============================================================================
// Extraction
// =============================================================================

/// Run every pattern over the chunk and return deduplicated hits.
///
/// Hits are deduplicated by `(kind, value-or-truncated-match, start_page,
/// end_page)`, keeping the first occurrence.
pub fn fast_hits(chunk: &Chunk) -> Vec<RegexHit> {
    let text = chunk.text.as_str();
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut hits = Vec::new();

    for pattern in PATTERNS {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };

            let matched = if pattern.kind == HitKind::Requirement {
                sentence_scope(text, &whole)
            } else {
                whole.as_str().trim()
            };

            if pattern.kind.drops_short_matches()
                && matched.chars().count() < MIN_NOISY_MATCH_CHARS
            {
                continue;
            }

            let matched = truncate_chars(matched, MAX_MATCH_CHARS).to_string();
            let value = normalize_value(pattern.kind, &caps);

            let key = (
                pattern.kind,
                value
                    .clone()
                    .unwrap_or_else(|| truncate_chars(&matched, KEY_CHARS).to_string()),
                chunk.start_page,
                chunk.end_page,
            );
            if !seen.insert(key) {
                continue;
            }

            hits.push(RegexHit {
                kind: pattern.kind,
                matched,
                value,
                section: chunk.section.clone(),
                start_page: chunk.start_page,
                end_page: chunk.end_page,
                source: RecordSource::Regex,
            });
        }
    }

    hits
}

/// Expand a modality match to its sentence: from the previous `.` to the next.
fn sentence_scope<'t>(text: &'t str, m: &Match<'t>) -> &'t str {
    let start = text[..m.start()].rfind('.').map(|i| i + 1).unwrap_or(0);
    let end = match text[m.end()..].find('.') {
        Some(offset) => m.end() + offset,
        None => floor_char_boundary(text, m.end() + SENTENCE_FALLBACK_CHARS),
    };
    text[start..end].trim()
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

fn group(caps: &Captures<'_>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| caps.name(name))
        .map(|m| m.as_str().trim().to_string())
        .find(|v| !v.is_empty())
}

fn trim_date(date: &str) -> &str {
    date.trim().trim_end_matches(['.', ',', ';'])
}

/// Normalized value for a hit, per pattern family.
fn normalize_value(kind: HitKind, caps: &Captures<'_>) -> Option<String> {
    use HitKind::*;
    let whole = || caps.get(0).map(|m| m.as_str().trim().to_string());

    match kind {
        Deadline | QuestionsDue => {
            let parts: Vec<String> = ["date", "time", "tz"]
                .into_iter()
                .filter_map(|name| group(caps, &[name]))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        }
        PageLimit => group(caps, &["pages"]),
        FontSpec => {
            let family = group(caps, &["family", "family2"]).unwrap_or_default();
            let size = group(caps, &["size", "size2", "size3"]).unwrap_or_default();
            let family = family.split_whitespace().collect::<Vec<_>>().join(" ");
            Some(format!("{family} {size}pt").trim().to_string())
        }
        MarginSpec => group(caps, &["marg"]),
        FormatSpec => group(caps, &["fmt"])
            .map(|f| f.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()),
        EmailSizeLimit => group(caps, &["mb"]),
        SubmissionPortal => group(caps, &["portal"]),
        SubmissionEmailHint | Email => group(caps, &["email"]),
        Volume => group(caps, &["vol"]).map(|v| v.to_uppercase()),
        Tab => group(caps, &["tab"]).map(|t| t.to_uppercase()),
        OralsDuration => group(caps, &["num"]),
        OralsHeadcount => group(caps, &["n"]),
        EvalCriteria => group(caps, &["weight"]),
        Naics => group(caps, &["naics"]),
        Psc => group(caps, &["psc"]).map(|p| p.to_uppercase()),
        QuoteValidityDays => group(caps, &["days"]),
        PeriodOfPerformance => {
            let text = caps.get(0)?.as_str();
            let mut dates = RE_DATE.find_iter(text).map(|m| trim_date(m.as_str()));
            let start = dates.next().unwrap_or_default();
            let end = dates.next().unwrap_or_default();
            let value = format!("{start} -> {end}");
            let value = value.trim_matches([' ', '-', '>']);
            (!value.is_empty()).then(|| value.to_string())
        }
        DiNumber | FarDfars | SecurityStd | ContractType | Cdrl | ReviewMeeting
        | PlaceOfPerformance | OralsPlatform | OralsProhibition | KeyPersonnel | Travel => {
            whole()
        }
        _ => None,
    }
}

/// Turn a regex hit into an unscored requirement record.
///
/// The label is the first 120 chars of the match; category follows the hit
/// kind and modality is read from the matched text.
pub fn hit_to_requirement(hit: &RegexHit) -> Requirement {
    let mut record = Requirement::new(hit.matched.clone())
        .with_label(truncate_chars(&hit.matched, KEY_CHARS))
        .with_category(hit.kind.category())
        .with_modality(Modality::detect(&hit.matched).unwrap_or(Modality::Unknown))
        .with_section(hit.section.clone())
        .with_pages(hit.start_page, hit.end_page)
        .with_source(RecordSource::Regex);

    if let Ok(kind) = serde_json::to_value(hit.kind) {
        record.extra.insert("kind".into(), kind);
    }
    if let Some(value) = &hit.value {
        record.extra.insert("value".into(), Value::String(value.clone()));
    }
    record
}

// =============================================================================
// Summary
// =============================================================================

/// Keyword counts and feature flags for a block of text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementSummary {
    pub total_requirements: usize,
    pub shall_count: usize,
    pub must_count: usize,
    pub should_count: usize,
    pub may_count: usize,
    pub deliverables: usize,
    pub has_security_requirements: bool,
    pub has_performance_metrics: bool,
    pub has_time_constraints: bool,
    pub has_page_limits: bool,
    pub has_orals: bool,
    pub has_section_l_formatting: bool,
}

/// Summarize modality keywords and requirement features in `text`.
pub fn requirement_summary(text: &str) -> RequirementSummary {
    let mut summary = RequirementSummary::default();

    for caps in RE_SUMMARY_MODALITY.captures_iter(text) {
        match caps[1].to_ascii_lowercase().as_str() {
            "shall" => summary.shall_count += 1,
            "must" => summary.must_count += 1,
            "should" => summary.should_count += 1,
            _ => summary.may_count += 1,
        }
    }
    summary.total_requirements =
        summary.shall_count + summary.must_count + summary.should_count + summary.may_count;

    summary.deliverables = RE_SUMMARY_DELIVERABLE.find_iter(text).count();
    summary.has_security_requirements = RE_SECURITY_STD.is_match(text);
    summary.has_performance_metrics = RE_PERFORMANCE.is_match(text);
    summary.has_time_constraints = RE_TIME_REQUIREMENT.is_match(text);
    summary.has_page_limits = RE_PAGE_LIMIT.is_match(text);
    summary.has_orals = RE_ORALS_PLATFORM.is_match(text) || RE_ORALS_DURATION.is_match(text);
    summary.has_section_l_formatting = [&RE_FONT, &RE_MARGIN, &RE_FORMAT, &RE_LINE_SPACING]
        .iter()
        .any(|re| re.is_match(text));

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::requirement::Category;

    fn chunk(text: &str) -> Chunk {
        Chunk::new(0, text, "Section L", 3, 4)
    }

    fn find(hits: &[RegexHit], kind: HitKind) -> Option<&RegexHit> {
        hits.iter().find(|h| h.kind == kind)
    }

    #[test]
    fn test_all_patterns_compile() {
        for pattern in PATTERNS {
            LazyLock::force(pattern.regex);
        }
        LazyLock::force(&RE_DATE);
    }

    #[test]
    fn test_requirement_expands_to_sentence() {
        let hits = fast_hits(&chunk(
            "Intro text. The contractor shall deliver the monthly report on time. Next.",
        ));
        let hit = find(&hits, HitKind::Requirement).unwrap();
        assert_eq!(hit.matched, "The contractor shall deliver the monthly report on time");
        assert_eq!(hit.section, "Section L");
        assert_eq!((hit.start_page, hit.end_page), (3, 4));
        assert_eq!(hit.source, RecordSource::Regex);
    }

    #[test]
    fn test_short_requirement_matches_dropped() {
        let hits = fast_hits(&chunk("You may."));
        assert!(find(&hits, HitKind::Requirement).is_none());
    }

    #[test]
    fn test_deadline_value() {
        let hits = fast_hits(&chunk(
            "Proposals are due no later than August 31, 2025 at 2:00 PM ET via email.",
        ));
        let hit = find(&hits, HitKind::Deadline).unwrap();
        assert_eq!(hit.value.as_deref(), Some("August 31, 2025 2:00 PM ET"));
    }

    #[test]
    fn test_section_l_formatting_values() {
        let hits = fast_hits(&chunk(
            "The technical volume shall not exceed 25 pages. Use Times New Roman 12 point font, \
             single-spaced, with margins of 1 inch. Submit as searchable PDF.",
        ));

        assert_eq!(find(&hits, HitKind::PageLimit).unwrap().value.as_deref(), Some("25"));
        assert_eq!(
            find(&hits, HitKind::FontSpec).unwrap().value.as_deref(),
            Some("Times New Roman 12pt")
        );
        assert_eq!(find(&hits, HitKind::MarginSpec).unwrap().value.as_deref(), Some("1"));
        assert_eq!(
            find(&hits, HitKind::FormatSpec).unwrap().value.as_deref(),
            Some("SEARCHABLE PDF")
        );
        assert!(find(&hits, HitKind::LineSpacing).is_some());
    }

    #[test]
    fn test_codes_and_portals() {
        let hits = fast_hits(&chunk(
            "NAICS code 541512 applies; PSC: D302. Quotes shall be submitted via SAM.gov. \
             See FAR 52.212-1 and DFARS 252.204-7012.",
        ));

        assert_eq!(find(&hits, HitKind::Naics).unwrap().value.as_deref(), Some("541512"));
        assert_eq!(find(&hits, HitKind::Psc).unwrap().value.as_deref(), Some("D302"));
        assert_eq!(
            find(&hits, HitKind::SubmissionPortal).unwrap().value.as_deref(),
            Some("SAM.gov")
        );
        let clauses: Vec<_> = hits.iter().filter(|h| h.kind == HitKind::FarDfars).collect();
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn test_period_of_performance_dates() {
        let hits = fast_hits(&chunk(
            "Period of Performance: 10/01/2025 through 09/30/2026\nOther text",
        ));
        let hit = find(&hits, HitKind::PeriodOfPerformance).unwrap();
        assert_eq!(hit.value.as_deref(), Some("10/01/2025 -> 09/30/2026"));
    }

    #[test]
    fn test_hits_deduplicate_within_chunk() {
        let hits = fast_hits(&chunk("Contact: buyer@agency.gov or buyer@agency.gov."));
        let emails: Vec<_> = hits.iter().filter(|h| h.kind == HitKind::Email).collect();
        assert_eq!(emails.len(), 1);
    }

    #[test]
    fn test_matches_truncated() {
        let long = format!("The offeror shall {}", "provide ".repeat(100));
        let hits = fast_hits(&chunk(&long));
        let hit = find(&hits, HitKind::Requirement).unwrap();
        assert_eq!(hit.matched.chars().count(), MAX_MATCH_CHARS);
    }

    #[test]
    fn test_empty_chunk() {
        assert!(fast_hits(&chunk("   ")).is_empty());
    }

    #[test]
    fn test_hit_to_requirement() {
        let hits = fast_hits(&chunk("Offerors must submit via SAM.gov."));
        let hit = find(&hits, HitKind::SubmissionPortal).unwrap();
        let record = hit_to_requirement(hit);

        assert_eq!(record.category, Some(Category::Submission));
        assert_eq!(record.modality, Some(Modality::Unknown));
        assert_eq!(record.source, Some(RecordSource::Regex));
        assert_eq!(record.page_start, Some(3));
        assert_eq!(record.extra.get("value"), Some(&Value::String("SAM.gov".into())));
        assert!(record.is_valid());

        let sentence = hit_to_requirement(find(&hits, HitKind::Requirement).unwrap());
        assert_eq!(sentence.modality, Some(Modality::Must));
        assert_eq!(sentence.label, "Offerors must submit via SAM");
    }

    #[test]
    fn test_requirement_summary() {
        let summary = requirement_summary(
            "The contractor shall comply. Offerors must register. You may ask. \
             Each deliverable is due within 10 business days. Orals via Microsoft Teams.",
        );
        assert_eq!(summary.shall_count, 1);
        assert_eq!(summary.must_count, 1);
        assert_eq!(summary.may_count, 1);
        assert_eq!(summary.total_requirements, 3);
        assert_eq!(summary.deliverables, 1);
        assert!(summary.has_time_constraints);
        assert!(summary.has_orals);
        assert!(!summary.has_page_limits);
    }
}
