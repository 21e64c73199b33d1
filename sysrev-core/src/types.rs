//! Shared data shapes flowing between pipeline stages.
//!
//! These types form the contract that lets each stage be implemented and
//! tested independently, including against synthetic inputs that never touch
//! a real external service. Candidate works are immutable once retrieved;
//! later stages annotate them through the [`StageAnnotations`] side-map
//! keyed by identifier, so retrieval data is never lost or rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Retrieval,
    Prescreen,
    LinkResolution,
    Synthesis,
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageName::Retrieval => "retrieval",
            StageName::Prescreen => "prescreen",
            StageName::LinkResolution => "link_resolution",
            StageName::Synthesis => "synthesis",
        };
        f.write_str(name)
    }
}

/// Classification of a recorded failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ServiceUnavailable,
    MalformedResponse,
    Cancelled,
    Configuration,
}

/// One retrieved bibliographic record.
///
/// Created by the retrieval stage and read-only downstream. The `source`
/// blob keeps the raw record slice (publisher, URL, container title) so
/// nothing from retrieval is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateWork {
    /// DOI or equivalent identifier.
    pub id: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    /// Raw source metadata as returned by the search API.
    pub source: serde_json::Value,
}

/// The inclusion/exclusion decision for one candidate, immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionVerdict {
    pub include: bool,
    pub rationale: String,
}

impl InclusionVerdict {
    pub fn include() -> Self {
        Self {
            include: true,
            rationale: "all criteria satisfied".to_string(),
        }
    }

    pub fn exclude(rationale: impl Into<String>) -> Self {
        Self {
            include: false,
            rationale: rationale.into(),
        }
    }
}

/// A resolved full-text access point for an included candidate.
///
/// An empty link is a valid terminal state (the work has no resolvable
/// full text), distinct from an infrastructure failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLink {
    pub url: Option<String>,
}

impl AccessLink {
    pub fn resolved(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
        }
    }

    pub fn none() -> Self {
        Self { url: None }
    }

    pub fn is_resolved(&self) -> bool {
        self.url.is_some()
    }
}

/// Structured extraction produced by the synthesis stage for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub key_findings: Vec<String>,
    pub limitations: Vec<String>,
    /// Free-form confidence note from the model.
    #[serde(default)]
    pub confidence: Option<String>,
}

/// A recorded failure, scoped either to one item or to a whole stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: StageName,
    /// Identifier of the affected candidate, or `None` for stage-level.
    pub item: Option<String>,
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn item_scoped(
        stage: StageName,
        item: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            item: Some(item.into()),
            kind,
            message: message.into(),
        }
    }

    pub fn stage_level(stage: StageName, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            item: None,
            kind,
            message: message.into(),
        }
    }
}

/// Terminal and intermediate states of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Retrieving,
    Prescreening,
    ResolvingLinks,
    Synthesizing,
    Complete,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Retrieving => "retrieving",
            RunState::Prescreening => "prescreening",
            RunState::ResolvingLinks => "resolving_links",
            RunState::Synthesizing => "synthesizing",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Per-candidate annotations accumulated by the stages after retrieval.
///
/// Keyed by candidate identifier so the original retrieval records stay
/// untouched. Concurrent workers append through the orchestrator's lock.
#[derive(Debug, Default)]
pub struct StageAnnotations {
    pub verdicts: HashMap<String, InclusionVerdict>,
    pub links: HashMap<String, AccessLink>,
    pub syntheses: HashMap<String, SynthesisResult>,
}

impl StageAnnotations {
    pub fn new() -> Self {
        Self::default()
    }
}

/// One row of the final report: a candidate joined with whatever the later
/// stages produced for it. `None` fields mean the stage skipped or failed
/// the item; the failure list carries the explicit reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub work: CandidateWork,
    pub verdict: Option<InclusionVerdict>,
    pub link: Option<AccessLink>,
    pub synthesis: Option<SynthesisResult>,
}

/// The final aggregate produced by a pipeline run.
///
/// Invariant: every candidate that entered the pipeline appears exactly once
/// in `entries`, in original retrieval order, and every failure that occurred
/// appears in `failures`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub question: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<ReportEntry>,
    pub failures: Vec<StageFailure>,
}

impl PipelineReport {
    /// Number of candidates with an `include` verdict.
    pub fn included_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.verdict.as_ref().is_some_and(|v| v.include))
            .count()
    }

    /// Failures recorded for a given stage.
    pub fn failures_for(&self, stage: StageName) -> Vec<&StageFailure> {
        self.failures.iter().filter(|f| f.stage == stage).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work(id: &str) -> CandidateWork {
        CandidateWork {
            id: id.to_string(),
            title: format!("Title {id}"),
            abstract_text: None,
            year: Some(2020),
            source: serde_json::json!({}),
        }
    }

    #[test]
    fn test_stage_name_display() {
        assert_eq!(StageName::Retrieval.to_string(), "retrieval");
        assert_eq!(StageName::LinkResolution.to_string(), "link_resolution");
    }

    #[test]
    fn test_verdict_constructors() {
        let inc = InclusionVerdict::include();
        assert!(inc.include);
        assert_eq!(inc.rationale, "all criteria satisfied");

        let exc = InclusionVerdict::exclude("min_year");
        assert!(!exc.include);
        assert_eq!(exc.rationale, "min_year");
    }

    #[test]
    fn test_access_link_states() {
        assert!(AccessLink::resolved("https://doi.org/x").is_resolved());
        assert!(!AccessLink::none().is_resolved());
    }

    #[test]
    fn test_report_included_count() {
        let report = PipelineReport {
            run_id: Uuid::new_v4(),
            question: "q".into(),
            state: RunState::Complete,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            entries: vec![
                ReportEntry {
                    work: work("10.1/a"),
                    verdict: Some(InclusionVerdict::include()),
                    link: None,
                    synthesis: None,
                },
                ReportEntry {
                    work: work("10.1/b"),
                    verdict: Some(InclusionVerdict::exclude("min_year")),
                    link: None,
                    synthesis: None,
                },
                ReportEntry {
                    work: work("10.1/c"),
                    verdict: None,
                    link: None,
                    synthesis: None,
                },
            ],
            failures: vec![StageFailure::item_scoped(
                StageName::LinkResolution,
                "10.1/a",
                FailureKind::ServiceUnavailable,
                "retries exhausted",
            )],
        };

        assert_eq!(report.included_count(), 1);
        assert_eq!(report.failures_for(StageName::LinkResolution).len(), 1);
        assert_eq!(report.failures_for(StageName::Synthesis).len(), 0);
    }

    #[test]
    fn test_candidate_serde_abstract_rename() {
        let json = serde_json::json!({
            "id": "10.1/x",
            "title": "T",
            "abstract": "some text",
            "year": 2019,
            "source": {"publisher": "X"}
        });
        let work: CandidateWork = serde_json::from_value(json).unwrap();
        assert_eq!(work.abstract_text.as_deref(), Some("some text"));
    }
}
