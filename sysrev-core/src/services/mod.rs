//! External service clients.
//!
//! The pipeline talks to two collaborators: a literature-search API
//! (Crossref) and a language-model inference service (Gemini). Stages depend
//! on the [`LiteratureSearch`] and [`InsightModel`] traits rather than the
//! concrete clients, so every stage can be tested against the queue-based
//! mocks below without touching the network.

pub mod llm;
pub mod search;

use crate::error::ServiceError;
use crate::types::{AccessLink, CandidateWork};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub use llm::GeminiClient;
pub use search::CrossrefClient;

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub items: Vec<CandidateWork>,
    /// Total result count reported by the service, when known.
    pub total_results: Option<usize>,
}

/// Literature-search API: paginated bibliographic queries plus per-work
/// link lookup.
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    /// Fetch one page of works matching `query`.
    async fn search_page(
        &self,
        query: &str,
        offset: usize,
        rows: usize,
    ) -> Result<SearchPage, ServiceError>;

    /// Resolve a full-text access point for one work. Absence of a link is
    /// a valid outcome, not an error.
    async fn resolve_link(&self, id: &str) -> Result<AccessLink, ServiceError>;
}

/// Language-model inference service. Returns the model's raw text output;
/// structural validation happens in the synthesis stage.
#[async_trait]
pub trait InsightModel: Send + Sync {
    async fn extract(&self, prompt: &str) -> Result<String, ServiceError>;
}

/// Queue-based mock search service for tests.
///
/// Pages are returned in the order queued; an exhausted queue yields an
/// empty page, which the retrieval stage treats as end-of-results.
#[derive(Default)]
pub struct MockLiteratureSearch {
    pages: Mutex<Vec<Result<SearchPage, ServiceError>>>,
    links: Mutex<HashMap<String, Result<AccessLink, ServiceError>>>,
}

impl MockLiteratureSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page to be returned by the next `search_page` call.
    pub fn queue_page(&self, page: Result<SearchPage, ServiceError>) {
        self.pages.lock().unwrap().push(page);
    }

    /// Set the outcome of `resolve_link` for one work.
    pub fn set_link(&self, id: impl Into<String>, outcome: Result<AccessLink, ServiceError>) {
        self.links.lock().unwrap().insert(id.into(), outcome);
    }
}

#[async_trait]
impl LiteratureSearch for MockLiteratureSearch {
    async fn search_page(
        &self,
        _query: &str,
        _offset: usize,
        _rows: usize,
    ) -> Result<SearchPage, ServiceError> {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            Ok(SearchPage {
                items: Vec::new(),
                total_results: Some(0),
            })
        } else {
            pages.remove(0)
        }
    }

    async fn resolve_link(&self, id: &str) -> Result<AccessLink, ServiceError> {
        match self.links.lock().unwrap().remove(id) {
            Some(outcome) => outcome,
            None => Ok(AccessLink::none()),
        }
    }
}

/// Queue-based mock model for tests.
#[derive(Default)]
pub struct MockInsightModel {
    responses: Mutex<Vec<Result<String, ServiceError>>>,
}

impl MockInsightModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that always returns the given text.
    ///
    /// Queues multiple copies of the response so it can handle multiple calls.
    pub fn with_response(text: &str) -> Self {
        let model = Self::new();
        for _ in 0..20 {
            model.queue_response(Ok(text.to_string()));
        }
        model
    }

    /// Queue a response to be returned by the next `extract` call.
    pub fn queue_response(&self, response: Result<String, ServiceError>) {
        self.responses.lock().unwrap().push(response);
    }
}

#[async_trait]
impl InsightModel for MockInsightModel {
    async fn extract(&self, _prompt: &str) -> Result<String, ServiceError> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(r#"{"key_findings": [], "limitations": []}"#.to_string())
        } else {
            responses.remove(0)
        }
    }
}
