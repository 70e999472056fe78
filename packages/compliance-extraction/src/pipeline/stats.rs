//! Summary statistics over a canonical requirement list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::requirement::Requirement;

/// Counts by modality, category and source, plus average confidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequirementStats {
    pub total: usize,
    pub by_modality: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,

    /// Mean confidence over records that have one, rounded to 3 decimals
    pub avg_confidence: Option<f64>,

    /// Records flagged for human adjudication
    pub requires_adjudication: usize,
}

impl RequirementStats {
    pub fn from_records(records: &[Requirement]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Default::default()
        };

        let mut confidence_sum = 0.0;
        let mut scored = 0usize;

        for record in records {
            let modality = record.modality.map(|m| m.as_str()).unwrap_or("UNKNOWN");
            *stats.by_modality.entry(modality.to_string()).or_default() += 1;

            let category = record.category.as_ref().map(|c| c.as_str()).unwrap_or("Other");
            *stats.by_category.entry(category.to_string()).or_default() += 1;

            let source = record.source.map(|s| s.as_str()).unwrap_or("unknown");
            *stats.by_source.entry(source.to_string()).or_default() += 1;

            if let Some(confidence) = record.confidence {
                confidence_sum += confidence;
                scored += 1;
            }
            if record.requires_adjudication {
                stats.requires_adjudication += 1;
            }
        }

        if scored > 0 {
            stats.avg_confidence = Some((confidence_sum / scored as f64 * 1000.0).round() / 1000.0);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::requirement::{Category, Modality, RecordSource};

    #[test]
    fn test_counts_and_average() {
        let records = vec![
            Requirement::new("a")
                .with_modality(Modality::Shall)
                .with_category(Category::Submission)
                .with_source(RecordSource::Regex)
                .with_confidence(0.65),
            Requirement::new("b")
                .with_modality(Modality::Shall)
                .with_category(Category::Technical)
                .with_source(RecordSource::Llm)
                .with_confidence(0.97),
            Requirement::new("c"),
        ];

        let stats = RequirementStats::from_records(&records);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_modality.get("SHALL"), Some(&2));
        assert_eq!(stats.by_modality.get("UNKNOWN"), Some(&1));
        assert_eq!(stats.by_category.get("Other"), Some(&1));
        assert_eq!(stats.by_source.get("llm"), Some(&1));
        assert_eq!(stats.avg_confidence, Some(0.81));
    }

    #[test]
    fn test_empty() {
        let stats = RequirementStats::from_records(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.avg_confidence, None);
    }
}
