//! Confidence scoring.
//!
//! A pure heuristic over provenance and quote shape. Safe to re-run at any
//! point as fields are added; 1.0 is never assigned here (reserved for
//! manually verified items).

use crate::types::requirement::{RecordSource, Requirement};

/// Highest score this heuristic can assign.
pub const MAX_SCORE: f64 = 0.99;

/// Quote lengths (chars, trimmed) that earn the specificity boost.
const SPECIFIC_QUOTE: std::ops::RangeInclusive<usize> = 10..=240;

const QUOTE_BOOST: f64 = 0.02;

/// Score a record in `[0, 0.99]`, rounded to two decimals.
pub fn score(record: &Requirement) -> f64 {
    let mut base = match record.source {
        Some(RecordSource::Regex) => {
            if record.modality.is_some_and(|m| m.is_mandatory_keyword()) {
                0.65
            } else {
                0.55
            }
        }
        Some(RecordSource::Llm) if record.classified && record.grounded => 0.95,
        Some(RecordSource::Llm) => 0.85,
        None => 0.5,
    };

    if SPECIFIC_QUOTE.contains(&record.quote.trim().chars().count()) {
        base += QUOTE_BOOST;
    }

    (base.min(MAX_SCORE) * 100.0).round() / 100.0
}

/// Score a record in place.
pub fn annotate(record: &mut Requirement) {
    record.confidence = Some(score(record));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::requirement::Modality;

    #[test]
    fn test_regex_mandatory_scores_higher() {
        let mandatory = Requirement::new("x")
            .with_source(RecordSource::Regex)
            .with_modality(Modality::Shall);
        let advisory = Requirement::new("x")
            .with_source(RecordSource::Regex)
            .with_modality(Modality::Should);

        assert_eq!(score(&mandatory), 0.65);
        assert_eq!(score(&advisory), 0.55);
    }

    #[test]
    fn test_llm_classified_and_grounded_capped() {
        let mut record = Requirement::new("Offerors must submit via SAM.gov")
            .with_source(RecordSource::Llm);
        assert_eq!(score(&record), 0.87);

        record.classified = true;
        record.grounded = true;
        assert_eq!(score(&record), 0.97);
    }

    #[test]
    fn test_quote_boost_bounds() {
        let short = Requirement::new("  ten chars! ").with_source(RecordSource::Llm);
        assert_eq!(score(&short), 0.87);

        let tiny = Requirement::new("tiny").with_source(RecordSource::Llm);
        assert_eq!(score(&tiny), 0.85);

        let long = Requirement::new("a".repeat(241)).with_source(RecordSource::Llm);
        assert_eq!(score(&long), 0.85);

        let unknown = Requirement::new("a".repeat(240));
        assert_eq!(score(&unknown), 0.52);
    }

    #[test]
    fn test_llm_never_below_regex() {
        for modality in [Modality::Shall, Modality::May, Modality::Unknown] {
            for quote in ["", "Proposals are due by 5 PM ET", "x".repeat(300).as_str()] {
                let regex = Requirement::new(quote)
                    .with_modality(modality)
                    .with_source(RecordSource::Regex);
                let mut llm = regex.clone().with_source(RecordSource::Llm);
                llm.classified = true;
                llm.grounded = true;
                assert!(score(&llm) >= score(&regex));
            }
        }
    }

    #[test]
    fn test_annotate_sets_confidence() {
        let mut record = Requirement::new("x");
        annotate(&mut record);
        assert_eq!(record.confidence, Some(0.5));
    }
}
