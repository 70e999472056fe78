//! Integration tests for full pipeline runs.
//!
//! These tests drive the public API end to end:
//! 1. Load or build documents
//! 2. Segment, fast path, Extract/Classify/Ground
//! 3. Merge across documents
//! 4. Report

use std::path::PathBuf;
use std::time::Duration;

use compliance_extraction::{
    merge, pipeline::prompts::STRICT_LIST_SUFFIX, testing::MockCompletion, CompletionRequest,
    DisabledCompletion, Document, ExtractionConfig, ExtractionError, MockLoader, Pipeline,
    PipelineConfig, RecordSource, SegmentMode, SegmenterConfig, Stage,
};
use serde_json::Value;

/// Page text that triggers no fast-path pattern.
const QUIET_PAGE: &str = "See the attached instructions.";

fn per_page() -> PipelineConfig {
    PipelineConfig::default()
        .with_segmenter(SegmenterConfig::default().with_mode(SegmentMode::PerPage))
        .with_extraction(
            ExtractionConfig::default()
                .with_retries(2, Duration::ZERO)
                .with_batch_retries(1, Duration::ZERO),
        )
}

fn regex_only() -> PipelineConfig {
    per_page().with_extraction(ExtractionConfig::default().with_llm(false))
}

fn citation_count(report: &compliance_extraction::RunReport) -> usize {
    report.requirements.iter().map(|r| r.sources.len()).sum()
}

#[tokio::test]
async fn test_modality_synonyms_merge_into_one_requirement() {
    let service = MockCompletion::new().with_reply(
        Stage::Extract,
        r#"[
            {"category": "Submission", "modality": "MUST", "quote": "Offerors must submit via SAM.gov"},
            {"category": "Submission", "modality": "SHALL", "quote": "Offerors shall submit via SAM.gov"},
            {"category": "Submission", "modality": "MUST", "quote": "Proposals are due by 5 PM ET"}
        ]"#,
    );
    let pipeline = Pipeline::with_config(service, per_page());

    let report = pipeline
        .run_documents(vec![Document::from_texts("rfp.txt", [QUIET_PAGE])])
        .await;

    assert!(report.failures.is_empty());
    assert_eq!(report.requirements.len(), 2);

    let sam = &report.requirements[0];
    assert_eq!(sam.sources.len(), 2);
    assert!(!sam.requires_adjudication);
    assert!(sam.id.as_deref().is_some_and(|id| id.starts_with("R-")));
    assert_eq!(sam.sources[0].doc.as_deref(), Some("rfp.txt"));
    assert_eq!(sam.sources[0].page, Some(1));

    assert_eq!(report.requirements[1].sources.len(), 1);
    assert_eq!(report.stats.total, 2);
}

#[tokio::test]
async fn test_fenced_response_with_prose_prefix() {
    let service = MockCompletion::new().with_reply(
        Stage::Extract,
        "Sure! Here are the requirements I found:\n```json\n[{\"category\": \"Formatting\", \"modality\": \"SHALL\", \"quote\": \"Use 12 point Times New Roman\"}]\n```\nLet me know if you need more.",
    );
    let pipeline = Pipeline::with_config(service, per_page());

    let outcome = pipeline
        .process_document("rfp.txt", &[compliance_extraction::Page::new(1, QUIET_PAGE)])
        .await
        .unwrap();

    assert_eq!(outcome.report.llm_extracted, 1);
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.records[0].quote, "Use 12 point Times New Roman");
}

#[tokio::test]
async fn test_transient_failure_retried_with_strict_instruction() {
    let service = MockCompletion::new()
        .with_error(Stage::Extract, ExtractionError::transient("timeout"))
        .with_reply(Stage::Extract, "not json at all")
        .with_reply(
            Stage::Extract,
            r#"[{"category": "Submission", "modality": "MUST", "quote": "Offerors must submit via SAM.gov"}]"#,
        );
    let pipeline = Pipeline::with_config(service, per_page());

    let outcome = pipeline
        .process_document("rfp.txt", &[compliance_extraction::Page::new(1, QUIET_PAGE)])
        .await
        .unwrap();

    let calls = pipeline.service().calls_for(Stage::Extract);
    assert_eq!(calls.len(), 3);
    assert!(!calls[0].input.contains(STRICT_LIST_SUFFIX));
    assert!(calls[2].input.ends_with(STRICT_LIST_SUFFIX));
    assert_eq!(outcome.records.len(), 1);
}

#[tokio::test]
async fn test_partial_batch_keeps_aligned_records() {
    let extracted: Vec<Value> = (1..=10)
        .map(|n| {
            serde_json::json!({
                "category": "Deliverables",
                "modality": "MUST",
                "quote": format!("Deliverable {n} must be delivered"),
            })
        })
        .collect();

    // Reply out of order and lose the last two records.
    let service = MockCompletion::new()
        .with_reply(Stage::Extract, Value::Array(extracted).to_string())
        .with_handler(Stage::BatchClassify, |request: &CompletionRequest| {
            let mut items: Vec<Value> = serde_json::from_str(&request.input)?;
            items.truncate(8);
            items.reverse();
            Ok(Value::Array(items).to_string())
        });
    let pipeline = Pipeline::with_config(service, per_page());

    let outcome = pipeline
        .process_document("rfp.txt", &[compliance_extraction::Page::new(1, QUIET_PAGE)])
        .await
        .unwrap();

    assert_eq!(outcome.report.llm_extracted, 10);
    assert_eq!(outcome.report.classified, 8);
    assert_eq!(outcome.report.grounded, 8);
    assert_eq!(outcome.records.len(), 8);

    let quotes: Vec<_> = outcome.records.iter().map(|r| r.quote.as_str()).collect();
    assert_eq!(quotes[0], "Deliverable 1 must be delivered");
    assert_eq!(quotes[7], "Deliverable 8 must be delivered");
    assert!(outcome.records.iter().all(|r| r.classified && r.grounded));
}

#[tokio::test]
async fn test_failing_document_does_not_stop_siblings() {
    let loader = MockLoader::new()
        .with_document("a.txt", ["Proposals are due by 5 PM ET on March 3, 2025."])
        .with_failure("b.pdf", "OCR failed")
        .with_document("c.txt", ["The Technical Volume shall not exceed 25 pages."]);

    let pipeline = Pipeline::with_config(MockCompletion::new(), regex_only());
    let paths = [
        PathBuf::from("a.txt"),
        PathBuf::from("b.pdf"),
        PathBuf::from("c.txt"),
    ];
    let report = pipeline.run(&loader, &paths).await;

    assert_eq!(loader.calls().len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "b.pdf");
    assert!(report.failures[0].error.contains("OCR failed"));

    let names: Vec<_> = report.documents.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "c.txt"]);
    assert!(!report.requirements.is_empty());
}

#[tokio::test]
async fn test_regex_only_never_calls_the_service() {
    let pipeline = Pipeline::with_config(DisabledCompletion, regex_only());

    let report = pipeline
        .run_documents(vec![Document::from_texts(
            "rfp.txt",
            ["Responses shall be submitted via SAM.gov.\nUse 12 point Times New Roman font."],
        )])
        .await;

    assert!(report.failures.is_empty());
    assert!(!report.requirements.is_empty());
    assert!(report
        .requirements
        .iter()
        .all(|r| r.source == Some(RecordSource::Regex)));
}

#[tokio::test]
async fn test_disabled_service_fails_documents_that_need_it() {
    let pipeline = Pipeline::with_config(DisabledCompletion, per_page());

    let report = pipeline
        .run_documents(vec![Document::from_texts("rfp.txt", [QUIET_PAGE])])
        .await;

    assert_eq!(report.failures.len(), 1);
    assert!(report.requirements.is_empty());
}

#[tokio::test]
async fn test_merge_conserves_citations_and_is_idempotent() {
    let service = MockCompletion::new()
        .with_reply(
            Stage::Extract,
            r#"[{"category": "Submission", "modality": "MUST", "quote": "Offerors must submit via SAM.gov"}]"#,
        )
        .with_reply(
            Stage::Extract,
            r#"[{"category": "Submission", "modality": "SHALL", "quote": "Offerors shall submit via SAM.gov"}]"#,
        );
    let pipeline = Pipeline::with_config(service, per_page());

    let report = pipeline
        .run_documents(vec![
            Document::from_texts("base.txt", ["Proposals are due by 5 PM ET on March 3, 2025."]),
            Document::from_texts("amendment.txt", ["The Technical Volume shall not exceed 25 pages."]),
        ])
        .await;

    let kept: usize = report.documents.iter().map(|d| d.kept).sum();
    assert_eq!(citation_count(&report), kept);

    let sam = report
        .requirements
        .iter()
        .find(|r| r.quote.contains("SAM.gov"))
        .unwrap();
    let docs: Vec<_> = sam.sources.iter().filter_map(|c| c.doc.as_deref()).collect();
    assert_eq!(docs, vec!["base.txt", "amendment.txt"]);

    let again = merge(report.requirements.clone(), &pipeline.config().merge);
    assert_eq!(again.len(), report.requirements.len());
    for (a, b) in report.requirements.iter().zip(&again) {
        assert_eq!(a.id, b.id);
        assert_eq!(a.sources, b.sources);
    }
}

#[tokio::test]
async fn test_llm_records_outscore_regex_records() {
    let service = MockCompletion::new().with_reply(
        Stage::Extract,
        r#"[{"category": "Formatting", "modality": "SHALL", "quote": "The Technical Volume shall not exceed 25 pages"}]"#,
    );
    let pipeline = Pipeline::with_config(service, per_page());

    let outcome = pipeline
        .process_document(
            "rfp.txt",
            &[compliance_extraction::Page::new(
                1,
                "The Technical Volume shall not exceed 25 pages.",
            )],
        )
        .await
        .unwrap();

    let score = |source: RecordSource| {
        outcome
            .records
            .iter()
            .filter(|r| r.source == Some(source))
            .filter_map(|r| r.confidence)
            .collect::<Vec<_>>()
    };
    let regex = score(RecordSource::Regex);
    let llm = score(RecordSource::Llm);

    assert!(!regex.is_empty());
    assert_eq!(llm.len(), 1);
    assert!(regex.iter().all(|r| *r < llm[0]));
    assert!(outcome
        .records
        .iter()
        .filter_map(|r| r.confidence)
        .all(|c| (0.0..1.0).contains(&c)));
}

#[tokio::test]
async fn test_report_serializes() {
    let pipeline = Pipeline::with_config(MockCompletion::new(), regex_only());
    let report = pipeline
        .run_documents(vec![Document::from_texts(
            "rfp.txt",
            ["Proposals are due by 5 PM ET on March 3, 2025."],
        )])
        .await;

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["requirements"].is_array());
    assert_eq!(json["documents"][0]["name"], "rfp.txt");
    assert!(json["stats"]["total"].as_u64().is_some());
}
