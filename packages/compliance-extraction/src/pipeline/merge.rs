//! Two-pass merge/dedupe.
//!
//! Pass 1 groups records by a canonical key (hash of normalized text plus
//! category). Pass 2 collapses near-duplicates among the survivors with a
//! token-set similarity ratio, after a cheap rare-token blocking check.
//!
//! Citations are only ever moved, never dropped: the total citation count
//! across the output equals the number of records that came in (counting a
//! previously merged record as the citations it already carries).

use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::config::MergeConfig;
use crate::types::requirement::{Citation, Requirement};

static RE_MODALITY_SYNONYM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:shall|must|will|should|may)\b").unwrap());

static RE_COVER_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:cover\s*letter|cl)\b").unwrap());

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static RE_CLOCK_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*(am|pm)(?:\s*et\b)?").unwrap());

static RE_LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:the\s+)?(?:quoters?|offerors?|contractors?)\s+must\s+").unwrap()
});

/// Tokens too common to count as evidence of a shared requirement.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "are", "all", "any", "not", "from", "into",
    "its", "their", "must", "shall", "will", "should", "may", "offeror", "offerors", "contractor",
    "contractors", "quoter", "quoters", "government", "proposal", "proposals",
];

/// Normalize requirement text for keying and comparison.
pub fn normalize(text: &str) -> String {
    let text = text.trim().to_lowercase();
    let text = RE_MODALITY_SYNONYM.replace_all(&text, "must");
    let text = RE_COVER_LETTER.replace_all(&text, "cover letter");
    let text = RE_WHITESPACE.replace_all(&text, " ");
    let text = RE_CLOCK_TIME.replace_all(&text, "$1$2");
    text.trim().to_string()
}

/// Normalized `label - quote` text with boilerplate lead-ins removed.
pub fn core_text(record: &Requirement) -> String {
    let label = normalize(&record.label);
    let quote = normalize(&record.quote);
    let quote = RE_LEAD_IN.replace(&quote, "");

    match (label.is_empty(), quote.is_empty()) {
        (true, _) => quote.into_owned(),
        (false, true) => label,
        (false, false) => format!("{} - {}", label, quote),
    }
}

/// Short fixed-width key over core text and category.
pub fn canonical_key(record: &Requirement) -> String {
    let category = record
        .category
        .as_ref()
        .map(|c| c.as_str().to_lowercase())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}", core_text(record), category).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

/// Token-set similarity in `[0, 100]`.
///
/// Compares the sorted token intersection against each side's
/// intersection-plus-remainder; identical token sets (or one contained in
/// the other) score 100.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let tokens_a: std::collections::BTreeSet<&str> = a.split_whitespace().collect();
    let tokens_b: std::collections::BTreeSet<&str> = b.split_whitespace().collect();
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let shared: Vec<&str> = tokens_a.intersection(&tokens_b).copied().collect();
    let only_a: Vec<&str> = tokens_a.difference(&tokens_b).copied().collect();
    let only_b: Vec<&str> = tokens_b.difference(&tokens_a).copied().collect();

    if !shared.is_empty() && (only_a.is_empty() || only_b.is_empty()) {
        return 100.0;
    }

    let shared = shared.join(" ");
    let with_a = join_nonempty(&shared, &only_a.join(" "));
    let with_b = join_nonempty(&shared, &only_b.join(" "));

    let mut best = ratio(&with_a, &with_b);
    if !shared.is_empty() {
        best = best.max(ratio(&shared, &with_a)).max(ratio(&shared, &with_b));
    }
    best
}

fn join_nonempty(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{} {}", head, tail),
    }
}

fn ratio(a: &str, b: &str) -> f64 {
    rapidfuzz::distance::indel::normalized_similarity(a.chars(), b.chars()) * 100.0
}

/// Merge records into canonical, citation-aggregated requirements.
pub fn merge(records: Vec<Requirement>, config: &MergeConfig) -> Vec<Requirement> {
    let incoming = records.len();
    let survivors = merge_exact(records);
    let after_exact = survivors.len();
    let merged = collapse_fuzzy(survivors, config);

    debug!(
        incoming,
        after_exact,
        canonical = merged.len(),
        "Merged requirements"
    );
    merged
}

/// Pass 1: exact canonical-key merge, first-occurrence order.
fn merge_exact(records: Vec<Requirement>) -> Vec<Requirement> {
    let mut by_key: IndexMap<String, Requirement> = IndexMap::new();

    for mut record in records {
        let key = canonical_key(&record);
        let citations = take_citations(&mut record);

        match by_key.get_mut(&key) {
            None => {
                if record.id.is_none() {
                    record.id = Some(format!("R-{}", key));
                }
                record.sources = citations;
                by_key.insert(key, record);
            }
            Some(canonical) => {
                canonical.sources.extend(citations);
                note_conflicts(canonical, &record);

                let incoming = record.confidence.unwrap_or(0.0);
                if incoming > canonical.confidence.unwrap_or(0.0) {
                    overwrite_content(canonical, record);
                }
            }
        }
    }

    by_key.into_values().collect()
}

/// Pass 2: fuzzy collapse among pass-1 survivors.
fn collapse_fuzzy(mut items: Vec<Requirement>, config: &MergeConfig) -> Vec<Requirement> {
    let cores: Vec<String> = items.iter().map(core_text).collect();
    let rare: Vec<HashSet<&str>> = cores
        .iter()
        .map(|core| rare_tokens(core, config.min_token_len))
        .collect();

    let mut absorbed = vec![false; items.len()];
    for i in 0..items.len() {
        if absorbed[i] {
            continue;
        }
        for j in (i + 1)..items.len() {
            if absorbed[j] {
                continue;
            }
            if rare[i].intersection(&rare[j]).count() < config.min_shared_tokens {
                continue;
            }

            let similarity = token_set_ratio(&cores[i], &cores[j]);
            if similarity >= config.similarity_threshold {
                debug!(
                    keep = ?items[i].id,
                    absorb = ?items[j].id,
                    similarity,
                    "Collapsing near-duplicate"
                );
                let sources = std::mem::take(&mut items[j].sources);
                let (head, tail) = items.split_at_mut(j);
                note_conflicts(&mut head[i], &tail[0]);
                head[i].sources.extend(sources);
                absorbed[j] = true;
            }
        }
    }

    items
        .into_iter()
        .zip(absorbed)
        .filter_map(|(item, gone)| (!gone).then_some(item))
        .collect()
}

/// A record's citations: the ones it already carries, or a fresh one.
fn take_citations(record: &mut Requirement) -> Vec<Citation> {
    if record.sources.is_empty() {
        vec![record.citation()]
    } else {
        std::mem::take(&mut record.sources)
    }
}

fn overwrite_content(canonical: &mut Requirement, winner: Requirement) {
    if !winner.label.is_empty() {
        canonical.label = winner.label;
    }
    if !winner.quote.is_empty() {
        canonical.quote = winner.quote;
    }
    canonical.modality = winner.modality.or(canonical.modality);
    canonical.category = winner.category.or(canonical.category.take());
    canonical.section = winner.section.or(canonical.section.take());
    canonical.page_start = winner.page_start.or(canonical.page_start);
    canonical.page_end = winner.page_end.or(canonical.page_end);
    canonical.confidence = winner.confidence.or(canonical.confidence);
}

/// Flag disagreement on modality strength or category.
fn note_conflicts(canonical: &mut Requirement, other: &Requirement) {
    let modality_differs = match (canonical.modality, other.modality) {
        (Some(a), Some(b)) => a.strength() != b.strength(),
        _ => false,
    };
    let category_differs = match (&canonical.category, &other.category) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    };

    for (differs, field) in [(modality_differs, "modality"), (category_differs, "category")] {
        if differs && !canonical.conflict_fields.iter().any(|f| f == field) {
            canonical.conflict_fields.push(field.to_string());
        }
    }
    for field in &other.conflict_fields {
        if !canonical.conflict_fields.contains(field) {
            canonical.conflict_fields.push(field.clone());
        }
    }

    canonical.requires_adjudication |= other.requires_adjudication || !canonical.conflict_fields.is_empty();
}

fn rare_tokens(core: &str, min_len: usize) -> HashSet<&str> {
    core.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= min_len && !STOPWORDS.contains(t))
        .collect()
}
