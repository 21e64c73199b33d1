//! Candidate retrieval from the literature-search API.
//!
//! Derives a boolean query from the research question and pages through
//! results until the service runs dry or the configured cap is reached.
//! Duplicate identifiers across adjacent pages keep their first occurrence,
//! so downstream ordering is stable.

use crate::error::{ServiceError, SysrevError};
use crate::question::ResearchQuestion;
use crate::services::LiteratureSearch;
use crate::types::{CandidateWork, StageFailure, StageName};
use std::collections::HashSet;

pub struct RetrievalStage<'a> {
    search: &'a dyn LiteratureSearch,
    max_results: usize,
    page_size: usize,
}

/// The retrieved candidate set plus any recoverable failures (truncation).
#[derive(Debug)]
pub struct RetrievalOutcome {
    pub candidates: Vec<CandidateWork>,
    pub failures: Vec<StageFailure>,
}

impl<'a> RetrievalStage<'a> {
    pub fn new(search: &'a dyn LiteratureSearch, max_results: usize, page_size: usize) -> Self {
        Self {
            search,
            max_results,
            page_size,
        }
    }

    /// Retrieve candidates for the question.
    ///
    /// An empty result set is valid. Failure of the first page is a
    /// stage-level error; a failure after at least one successful page
    /// returns the partial set plus a truncation failure record.
    pub async fn run(&self, question: &ResearchQuestion) -> Result<RetrievalOutcome, SysrevError> {
        let query = question.boolean_query();
        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<CandidateWork> = Vec::new();
        let mut failures: Vec<StageFailure> = Vec::new();
        let mut offset = 0usize;
        let mut pages_ok = 0u32;

        loop {
            if candidates.len() >= self.max_results {
                break;
            }
            let rows = self.page_size.min(self.max_results - candidates.len());

            let page = match self.search.search_page(&query, offset, rows).await {
                Ok(page) => page,
                Err(e) if pages_ok == 0 => {
                    return Err(self.stage_failed(e));
                }
                Err(e) => {
                    tracing::warn!(
                        offset = offset,
                        retrieved = candidates.len(),
                        error = %e,
                        "Later search page failed; keeping partial result set"
                    );
                    failures.push(StageFailure::stage_level(
                        StageName::Retrieval,
                        e.failure_kind(),
                        format!(
                            "result set truncated after {} candidates: {e}",
                            candidates.len()
                        ),
                    ));
                    break;
                }
            };

            pages_ok += 1;
            let fetched = page.items.len();
            if fetched == 0 {
                break;
            }

            for work in page.items {
                if candidates.len() >= self.max_results {
                    break;
                }
                if seen.insert(work.id.clone()) {
                    candidates.push(work);
                }
            }

            offset += fetched;
            if let Some(total) = page.total_results
                && offset >= total
            {
                break;
            }
            // A short page means the service ran out of results.
            if fetched < rows {
                break;
            }
        }

        tracing::debug!(
            candidates = candidates.len(),
            pages = pages_ok,
            "Retrieval complete"
        );
        Ok(RetrievalOutcome {
            candidates,
            failures,
        })
    }

    fn stage_failed(&self, source: ServiceError) -> SysrevError {
        SysrevError::Stage {
            stage: StageName::Retrieval,
            source,
        }
    }
}
