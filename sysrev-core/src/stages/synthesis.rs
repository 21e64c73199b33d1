//! Structured insight extraction via the language model.
//!
//! One model call per included candidate, dispatched through the bounded
//! worker pool. The response must parse into the required structured fields
//! (key findings, limitations); anything else is recorded against the item
//! as a malformed response rather than coerced into a partial result.

use crate::error::ServiceError;
use crate::services::{InsightModel, llm::strip_code_fences};
use crate::types::{
    CandidateWork, FailureKind, StageAnnotations, StageFailure, StageName, SynthesisResult,
};
use futures::StreamExt;
use std::sync::Mutex;
use tokio::time::Instant;

pub struct SynthesisStage<'a> {
    model: &'a dyn InsightModel,
    concurrency: usize,
}

impl<'a> SynthesisStage<'a> {
    pub fn new(model: &'a dyn InsightModel, concurrency: usize) -> Self {
        Self { model, concurrency }
    }

    /// Extract insights for all included candidates. Items are independent:
    /// one failure or retry exhaustion never blocks the others. Items not
    /// yet started when `deadline` passes are recorded as cancelled.
    pub async fn run(
        &self,
        included: &[&CandidateWork],
        annotations: &Mutex<StageAnnotations>,
        failures: &Mutex<Vec<StageFailure>>,
        deadline: Option<Instant>,
    ) {
        futures::stream::iter(included.iter().map(|work| {
            let id = work.id.clone();
            let prompt = build_prompt(work);
            async move {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    failures.lock().unwrap().push(StageFailure::item_scoped(
                        StageName::Synthesis,
                        id,
                        FailureKind::Cancelled,
                        "run deadline expired before synthesis started",
                    ));
                    return;
                }

                let outcome = match self.model.extract(&prompt).await {
                    Ok(text) => parse_synthesis(&text),
                    Err(e) => Err(e),
                };

                match outcome {
                    Ok(result) => {
                        tracing::debug!(id = %id, findings = result.key_findings.len(), "Synthesis done");
                        annotations.lock().unwrap().syntheses.insert(id, result);
                    }
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "Synthesis failed; continuing");
                        failures.lock().unwrap().push(StageFailure::item_scoped(
                            StageName::Synthesis,
                            id,
                            e.failure_kind(),
                            e.to_string(),
                        ));
                    }
                }
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect::<Vec<()>>()
        .await;
    }
}

/// Build the extraction prompt from the candidate's bibliographic text.
fn build_prompt(work: &CandidateWork) -> String {
    let mut context = format!("Title: {}\n", work.title);
    if let Some(year) = work.year {
        context.push_str(&format!("Year: {year}\n"));
    }
    match work.abstract_text.as_deref() {
        Some(abstract_text) => context.push_str(&format!("Abstract: {abstract_text}\n")),
        None => context.push_str("Abstract: (not available; use the title only)\n"),
    }

    format!(
        "You are screening literature for a systematic review. From the record \
         below, extract the study's key findings and limitations.\n\n{context}\n\
         Respond with a single JSON object, no prose, with these fields:\n\
         {{\"key_findings\": [string], \"limitations\": [string], \"confidence\": string}}"
    )
}

/// Validate the model's raw output against the required structure.
fn parse_synthesis(text: &str) -> Result<SynthesisResult, ServiceError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str::<SynthesisResult>(cleaned).map_err(|e| ServiceError::MalformedResponse {
        message: format!("synthesis output failed validation: {e}"),
    })
}
