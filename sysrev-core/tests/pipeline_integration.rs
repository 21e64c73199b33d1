//! Integration tests for the review pipeline.
//!
//! These tests exercise the full orchestrator end-to-end using the mock
//! service clients, verifying the Retrieve → Prescreen → ResolveLinks →
//! Synthesize sequence, the exactly-once report invariant, and the
//! deadline degradation behavior.

use std::time::Duration;
use sysrev_core::services::SearchPage;
use sysrev_core::{
    AccessLink, CandidateWork, Criterion, FailureKind, InsightModel, MockInsightModel,
    MockLiteratureSearch, PipelineOrchestrator, ResearchQuestion, ReviewConfig, RunState,
    ServiceError, StageName, async_trait,
};

const GOOD_RESPONSE: &str = r#"{
    "key_findings": ["Durable factor IX expression after a single infusion"],
    "limitations": ["Short follow-up window"],
    "confidence": "moderate"
}"#;

fn work(id: &str, year: i32, with_abstract: bool) -> CandidateWork {
    CandidateWork {
        id: id.to_string(),
        title: format!("Study {id}"),
        abstract_text: with_abstract.then(|| "Outcomes were assessed.".to_string()),
        year: Some(year),
        source: serde_json::json!({"publisher": "Example Press"}),
    }
}

/// A model that takes simulated wall-clock time per call, for deadline tests.
struct SlowModel {
    delay: Duration,
    inner: MockInsightModel,
}

#[async_trait]
impl InsightModel for SlowModel {
    async fn extract(&self, prompt: &str) -> Result<String, ServiceError> {
        tokio::time::sleep(self.delay).await;
        self.inner.extract(prompt).await
    }
}

/// The reference scenario: 12 retrieved, 7 pass prescreen, link resolution
/// fails for one of them, synthesis covers the remaining 6.
#[tokio::test]
async fn test_reference_scenario_gene_therapy_hemophilia() {
    let mut config = ReviewConfig::default();
    config.prescreen.criteria = vec![
        Criterion::MinYear { year: 2015 },
        Criterion::RequireAbstract,
    ];

    let search = MockLiteratureSearch::new();
    let mut works: Vec<CandidateWork> = Vec::new();
    // 7 recent candidates with abstracts, 5 older ones.
    for i in 0..7 {
        works.push(work(&format!("10.1/recent-{i}"), 2018, true));
    }
    for i in 0..5 {
        works.push(work(&format!("10.1/old-{i}"), 2012, true));
    }
    search.queue_page(Ok(SearchPage {
        items: works,
        total_results: Some(12),
    }));

    for i in 0..7 {
        let id = format!("10.1/recent-{i}");
        if i == 3 {
            search.set_link(
                id,
                Err(ServiceError::Unavailable {
                    attempts: 4,
                    last_error: "connection reset".into(),
                }),
            );
        } else {
            search.set_link(
                id.clone(),
                Ok(AccessLink::resolved(format!("https://example.org/{i}.pdf"))),
            );
        }
    }

    let model = MockInsightModel::with_response(GOOD_RESPONSE);
    let question = ResearchQuestion::new("gene therapy hemophilia");

    let orchestrator = PipelineOrchestrator::new(&config, &search, &model);
    let report = orchestrator.run(&question).await.unwrap();

    assert_eq!(report.state, RunState::Complete);
    assert_eq!(report.entries.len(), 12);
    assert_eq!(report.included_count(), 7);

    // Every exclusion names the first failing criterion.
    let excluded: Vec<_> = report
        .entries
        .iter()
        .filter(|e| e.verdict.as_ref().is_some_and(|v| !v.include))
        .collect();
    assert_eq!(excluded.len(), 5);
    assert!(
        excluded
            .iter()
            .all(|e| e.verdict.as_ref().unwrap().rationale == "min_year")
    );

    // One item-scoped link failure; synthesis covered the other six.
    let link_failures = report.failures_for(StageName::LinkResolution);
    assert_eq!(link_failures.len(), 1);
    assert_eq!(link_failures[0].item.as_deref(), Some("10.1/recent-3"));
    assert_eq!(link_failures[0].kind, FailureKind::ServiceUnavailable);

    assert_eq!(report.failures_for(StageName::Synthesis).len(), 0);
    let synthesized = report
        .entries
        .iter()
        .filter(|e| e.synthesis.is_some())
        .count();
    assert_eq!(synthesized, 6);

    // No duplication, no silent drop.
    let mut ids: Vec<&str> = report.entries.iter().map(|e| e.work.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 12);
}

/// Deadline expiry mid-synthesis degrades gracefully: processed items keep
/// their results, unstarted items are recorded as cancelled, and the run
/// still ends `Complete`.
#[tokio::test(start_paused = true)]
async fn test_deadline_mid_synthesis_degrades_gracefully() {
    let mut config = ReviewConfig::default();
    config.prescreen.criteria = vec![];
    config.pipeline.concurrency = 1;
    config.pipeline.deadline_secs = Some(25);

    let search = MockLiteratureSearch::new();
    let works: Vec<CandidateWork> = (0..6)
        .map(|i| work(&format!("10.1/w-{i}"), 2020, true))
        .collect();
    search.queue_page(Ok(SearchPage {
        items: works,
        total_results: Some(6),
    }));

    // Each synthesis call consumes 10 simulated seconds; with a 25 second
    // deadline and sequential dispatch, items 1-3 run and 4-6 never start.
    let model = SlowModel {
        delay: Duration::from_secs(10),
        inner: MockInsightModel::with_response(GOOD_RESPONSE),
    };

    let question = ResearchQuestion::new("gene therapy hemophilia");
    let orchestrator = PipelineOrchestrator::new(&config, &search, &model);
    let report = orchestrator.run(&question).await.unwrap();

    assert_eq!(report.state, RunState::Complete);
    assert_eq!(report.entries.len(), 6);

    let synthesized = report
        .entries
        .iter()
        .filter(|e| e.synthesis.is_some())
        .count();
    assert_eq!(synthesized, 3);

    let cancelled: Vec<_> = report
        .failures
        .iter()
        .filter(|f| f.kind == FailureKind::Cancelled)
        .collect();
    assert_eq!(cancelled.len(), 3);
    assert!(cancelled.iter().all(|f| f.stage == StageName::Synthesis));
}

/// Re-running prescreening over the same retrieved set produces identical
/// verdicts: the report is deterministic apart from run id and timestamps.
#[tokio::test]
async fn test_repeat_runs_yield_identical_verdicts() {
    let mut config = ReviewConfig::default();
    config.prescreen.criteria = vec![
        Criterion::MinYear { year: 2015 },
        Criterion::RequireAbstract,
    ];

    let question = ResearchQuestion::new("CRISPR screening in solid tumors");
    let mut all_verdicts = Vec::new();

    for _ in 0..2 {
        let search = MockLiteratureSearch::new();
        search.queue_page(Ok(SearchPage {
            items: vec![
                work("10.1/a", 2019, true),
                work("10.1/b", 2010, true),
                work("10.1/c", 2021, false),
            ],
            total_results: Some(3),
        }));
        let model = MockInsightModel::with_response(GOOD_RESPONSE);

        let orchestrator = PipelineOrchestrator::new(&config, &search, &model);
        let report = orchestrator.run(&question).await.unwrap();
        all_verdicts.push(
            report
                .entries
                .iter()
                .map(|e| e.verdict.clone().unwrap())
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(all_verdicts[0], all_verdicts[1]);
    assert_eq!(all_verdicts[0][1].rationale, "min_year");
    assert_eq!(all_verdicts[0][2].rationale, "require_abstract");
}
