//! The pipeline orchestrator.
//!
//! Sequences the four stages, feeding each stage the surviving subset of
//! the previous stage's output, and assembles the final report. Stage-level
//! failures (the search service unreachable, invalid criteria) escalate the
//! run to `Failed`; item-scoped failures are accumulated and never abort
//! the run. No state persists across runs.

use crate::config::ReviewConfig;
use crate::error::{Result, SysrevError};
use crate::question::ResearchQuestion;
use crate::services::{InsightModel, LiteratureSearch};
use crate::stages::{LinkResolutionStage, PrescreenStage, RetrievalStage, SynthesisStage};
use crate::types::{
    CandidateWork, PipelineReport, ReportEntry, RunState, StageAnnotations, StageFailure,
};
use chrono::Utc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

pub struct PipelineOrchestrator<'a> {
    config: &'a ReviewConfig,
    search: &'a dyn LiteratureSearch,
    model: &'a dyn InsightModel,
}

impl<'a> PipelineOrchestrator<'a> {
    pub fn new(
        config: &'a ReviewConfig,
        search: &'a dyn LiteratureSearch,
        model: &'a dyn InsightModel,
    ) -> Self {
        Self {
            config,
            search,
            model,
        }
    }

    /// Execute a full review run.
    ///
    /// Returns `Err` only for stage-level unrecoverable failures (the run's
    /// terminal state is `Failed`); every other outcome, including a
    /// deadline-truncated run, completes with a report that lists each
    /// candidate exactly once alongside all accumulated failures.
    pub async fn run(&self, question: &ResearchQuestion) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let deadline = self
            .config
            .pipeline
            .deadline_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        let mut state = RunState::Idle;

        // Invalid predicate configuration escalates before any network call.
        if let Err(e) = self.config.validate() {
            Self::transition(run_id, &mut state, RunState::Failed);
            return Err(SysrevError::Config(e));
        }

        let annotations = Mutex::new(StageAnnotations::new());
        let failures: Mutex<Vec<StageFailure>> = Mutex::new(Vec::new());

        // Retrieval.
        Self::transition(run_id, &mut state, RunState::Retrieving);
        let retrieval = RetrievalStage::new(
            self.search,
            self.config.pipeline.max_results,
            self.config.pipeline.page_size,
        );
        let candidates = match retrieval.run(question).await {
            Ok(outcome) => {
                failures.lock().unwrap().extend(outcome.failures);
                outcome.candidates
            }
            Err(e) => {
                Self::transition(run_id, &mut state, RunState::Failed);
                return Err(e);
            }
        };

        // Prescreen.
        Self::transition(run_id, &mut state, RunState::Prescreening);
        let prescreen = PrescreenStage::new(&self.config.prescreen);
        {
            let verdicts = prescreen.run(&candidates);
            let mut guard = annotations.lock().unwrap();
            for (id, verdict) in verdicts {
                guard.verdicts.insert(id, verdict);
            }
        }

        let included: Vec<&CandidateWork> = {
            let guard = annotations.lock().unwrap();
            candidates
                .iter()
                .filter(|w| guard.verdicts.get(&w.id).is_some_and(|v| v.include))
                .collect()
        };
        tracing::info!(
            run_id = %run_id,
            retrieved = candidates.len(),
            included = included.len(),
            "Prescreen complete"
        );

        // Link resolution, best-effort per item.
        Self::transition(run_id, &mut state, RunState::ResolvingLinks);
        let links = LinkResolutionStage::new(self.search, self.config.pipeline.concurrency);
        links.run(&included, &annotations, &failures, deadline).await;

        // Synthesis runs over included candidates whose link resolution
        // terminated normally (a present-but-empty link still qualifies);
        // items that failed or were cancelled already carry their failure
        // record and are not fed to the model.
        let synthesis_input: Vec<&CandidateWork> = {
            let guard = annotations.lock().unwrap();
            included
                .iter()
                .copied()
                .filter(|w| guard.links.contains_key(&w.id))
                .collect()
        };

        Self::transition(run_id, &mut state, RunState::Synthesizing);
        let synthesis = SynthesisStage::new(self.model, self.config.pipeline.concurrency);
        synthesis
            .run(&synthesis_input, &annotations, &failures, deadline)
            .await;

        Self::transition(run_id, &mut state, RunState::Complete);
        let annotations = annotations.into_inner().unwrap();
        let failures = failures.into_inner().unwrap();

        let entries = candidates
            .into_iter()
            .map(|work| {
                let id = work.id.clone();
                ReportEntry {
                    verdict: annotations.verdicts.get(&id).cloned(),
                    link: annotations.links.get(&id).cloned(),
                    synthesis: annotations.syntheses.get(&id).cloned(),
                    work,
                }
            })
            .collect();

        Ok(PipelineReport {
            run_id,
            question: question.raw().to_string(),
            state,
            started_at,
            finished_at: Utc::now(),
            entries,
            failures,
        })
    }

    fn transition(run_id: Uuid, state: &mut RunState, next: RunState) {
        tracing::info!(run_id = %run_id, from = %state, to = %next, "Pipeline state transition");
        *state = next;
    }
}
