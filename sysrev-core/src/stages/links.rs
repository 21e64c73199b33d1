//! Full-text link resolution.
//!
//! Best-effort: each included candidate is resolved independently through
//! the retry client, up to the configured worker-pool width. One item's
//! failure is recorded against that item and never aborts the rest. A work
//! with no resolvable link gets an empty [`AccessLink`], which is an
//! expected business outcome rather than a failure.

use crate::services::LiteratureSearch;
use crate::types::{CandidateWork, FailureKind, StageAnnotations, StageFailure, StageName};
use futures::StreamExt;
use std::sync::Mutex;
use tokio::time::Instant;

pub struct LinkResolutionStage<'a> {
    search: &'a dyn LiteratureSearch,
    concurrency: usize,
}

impl<'a> LinkResolutionStage<'a> {
    pub fn new(search: &'a dyn LiteratureSearch, concurrency: usize) -> Self {
        Self {
            search,
            concurrency,
        }
    }

    /// Resolve links for all included candidates, writing results into the
    /// shared annotation map and failures into the shared list. Items not
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
            async move {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    failures.lock().unwrap().push(StageFailure::item_scoped(
                        StageName::LinkResolution,
                        id,
                        FailureKind::Cancelled,
                        "run deadline expired before resolution started",
                    ));
                    return;
                }

                match self.search.resolve_link(&id).await {
                    Ok(link) => {
                        tracing::debug!(id = %id, resolved = link.is_resolved(), "Link resolution done");
                        annotations.lock().unwrap().links.insert(id, link);
                    }
                    Err(e) => {
                        tracing::warn!(id = %id, error = %e, "Link resolution failed; continuing");
                        failures.lock().unwrap().push(StageFailure::item_scoped(
                            StageName::LinkResolution,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::services::MockLiteratureSearch;
    use crate::types::{AccessLink, FailureKind};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn work(id: &str) -> CandidateWork {
        CandidateWork {
            id: id.to_string(),
            title: format!("Title {id}"),
            abstract_text: None,
            year: Some(2020),
            source: json!({}),
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let search = MockLiteratureSearch::new();
        search.set_link("10.1/a", Ok(AccessLink::resolved("https://x/a.pdf")));
        search.set_link(
            "10.1/b",
            Err(ServiceError::Unavailable {
                attempts: 4,
                last_error: "timeout".into(),
            }),
        );
        search.set_link("10.1/c", Ok(AccessLink::resolved("https://x/c.pdf")));

        let works = [work("10.1/a"), work("10.1/b"), work("10.1/c")];
        let included: Vec<&CandidateWork> = works.iter().collect();
        let annotations = Mutex::new(StageAnnotations::new());
        let failures = Mutex::new(Vec::new());

        let stage = LinkResolutionStage::new(&search, 5);
        stage.run(&included, &annotations, &failures, None).await;

        let annotations = annotations.into_inner().unwrap();
        assert_eq!(annotations.links.len(), 2);
        assert!(annotations.links["10.1/a"].is_resolved());

        let failures = failures.into_inner().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].item.as_deref(), Some("10.1/b"));
        assert_eq!(failures[0].kind, FailureKind::ServiceUnavailable);
    }

    #[tokio::test]
    async fn test_absent_link_is_not_a_failure() {
        let search = MockLiteratureSearch::new();
        search.set_link("10.1/a", Ok(AccessLink::none()));

        let works = [work("10.1/a")];
        let included: Vec<&CandidateWork> = works.iter().collect();
        let annotations = Mutex::new(StageAnnotations::new());
        let failures = Mutex::new(Vec::new());

        let stage = LinkResolutionStage::new(&search, 5);
        stage.run(&included, &annotations, &failures, None).await;

        let annotations = annotations.into_inner().unwrap();
        assert!(annotations.links.contains_key("10.1/a"));
        assert!(!annotations.links["10.1/a"].is_resolved());
        assert!(failures.into_inner().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline_cancels_unstarted_items() {
        let search = MockLiteratureSearch::new();
        let works = [work("10.1/a"), work("10.1/b")];
        let included: Vec<&CandidateWork> = works.iter().collect();
        let annotations = Mutex::new(StageAnnotations::new());
        let failures = Mutex::new(Vec::new());

        let expired = Instant::now() - Duration::from_secs(1);
        let stage = LinkResolutionStage::new(&search, 5);
        stage
            .run(&included, &annotations, &failures, Some(expired))
            .await;

        assert!(annotations.into_inner().unwrap().links.is_empty());
        let failures = failures.into_inner().unwrap();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.kind == FailureKind::Cancelled));
    }
}
