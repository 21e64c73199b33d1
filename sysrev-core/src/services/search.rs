//! Crossref works API client.
//!
//! Implements [`LiteratureSearch`] against the Crossref REST API:
//! `GET /works?query=...&rows=...&offset=...` for paginated retrieval and
//! `GET /works/{doi}` for full-text link lookup. The polite-pool contact
//! e-mail is sent in the User-Agent.
//!
//! Records without a DOI are skipped: every candidate downstream is keyed
//! by identifier, so an unidentifiable record cannot be tracked.

use super::{LiteratureSearch, SearchPage};
use crate::client::ServiceClient;
use crate::config::{Credentials, RetryConfig, SearchApiConfig};
use crate::error::ServiceError;
use crate::types::{AccessLink, CandidateWork};
use async_trait::async_trait;
use serde_json::Value;

pub struct CrossrefClient {
    client: ServiceClient,
    base_url: String,
}

impl CrossrefClient {
    pub fn new(
        config: &SearchApiConfig,
        retry: RetryConfig,
        credentials: &Credentials,
    ) -> Result<Self, ServiceError> {
        let user_agent = format!(
            "sysrev/{} (mailto:{})",
            env!("CARGO_PKG_VERSION"),
            credentials.contact_email
        );
        let client = ServiceClient::new(retry, config.request_timeout_secs, &user_agent)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Parse one Crossref item into a candidate. Returns `None` when the
    /// record has no DOI.
    fn parse_work(item: &Value) -> Option<CandidateWork> {
        let id = item.get("DOI")?.as_str()?.to_string();
        let title = item
            .get("title")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .and_then(|t| t.as_str())
            .unwrap_or("Untitled")
            .to_string();
        let abstract_text = item
            .get("abstract")
            .and_then(|a| a.as_str())
            .map(strip_jats_tags)
            .filter(|a| !a.is_empty());
        let year = item
            .get("issued")
            .and_then(|i| i.get("date-parts"))
            .and_then(|d| d.get(0))
            .and_then(|d| d.get(0))
            .and_then(|y| y.as_i64())
            .map(|y| y as i32);
        let source = serde_json::json!({
            "publisher": item.get("publisher"),
            "container-title": item.get("container-title"),
            "URL": item.get("URL"),
        });

        Some(CandidateWork {
            id,
            title,
            abstract_text,
            year,
            source,
        })
    }

    fn parse_page(body: &Value) -> Result<SearchPage, ServiceError> {
        let message = body
            .get("message")
            .ok_or_else(|| ServiceError::MalformedResponse {
                message: "missing 'message' envelope".into(),
            })?;
        let items = message
            .get("items")
            .and_then(|i| i.as_array())
            .ok_or_else(|| ServiceError::MalformedResponse {
                message: "missing 'message.items' array".into(),
            })?;

        let works = items.iter().filter_map(Self::parse_work).collect();
        let total_results = message
            .get("total-results")
            .and_then(|t| t.as_u64())
            .map(|t| t as usize);

        Ok(SearchPage {
            items: works,
            total_results,
        })
    }

    /// Pull a full-text URL out of a `works/{doi}` response: prefer the
    /// first `link` entry, fall back to the landing-page URL.
    fn extract_link(body: &Value) -> AccessLink {
        let message = match body.get("message") {
            Some(m) => m,
            None => return AccessLink::none(),
        };

        let from_links = message
            .get("link")
            .and_then(|l| l.as_array())
            .and_then(|l| l.first())
            .and_then(|l| l.get("URL"))
            .and_then(|u| u.as_str());
        let url = from_links.or_else(|| message.get("URL").and_then(|u| u.as_str()));

        match url {
            Some(u) => AccessLink::resolved(u),
            None => AccessLink::none(),
        }
    }
}

#[async_trait]
impl LiteratureSearch for CrossrefClient {
    async fn search_page(
        &self,
        query: &str,
        offset: usize,
        rows: usize,
    ) -> Result<SearchPage, ServiceError> {
        let url = format!(
            "{}/works?query={}&rows={}&offset={}",
            self.base_url,
            urlencoding::encode(query),
            rows,
            offset
        );
        let body = self.client.get_json(&url).await?;
        Self::parse_page(&body)
    }

    async fn resolve_link(&self, id: &str) -> Result<AccessLink, ServiceError> {
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(id));
        match self.client.get_json(&url).await {
            Ok(body) => Ok(Self::extract_link(&body)),
            // An unknown DOI has no link; that is a business outcome, not
            // an infrastructure failure.
            Err(ServiceError::Status { code: 404, .. }) => Ok(AccessLink::none()),
            Err(e) => Err(e),
        }
    }
}

/// Crossref abstracts arrive as JATS XML fragments; drop the markup and
/// keep the text.
fn strip_jats_tags(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_tag = false;
    for c in raw.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_work_maps_crossref_fields() {
        let item = json!({
            "DOI": "10.1000/xyz",
            "title": ["Gene therapy outcomes"],
            "abstract": "<jats:p>Long-term follow-up.</jats:p>",
            "issued": {"date-parts": [[2019, 4]]},
            "publisher": "Example Press",
            "container-title": ["Journal of Examples"],
            "URL": "https://doi.org/10.1000/xyz"
        });

        let work = CrossrefClient::parse_work(&item).unwrap();
        assert_eq!(work.id, "10.1000/xyz");
        assert_eq!(work.title, "Gene therapy outcomes");
        assert_eq!(work.abstract_text.as_deref(), Some("Long-term follow-up."));
        assert_eq!(work.year, Some(2019));
        assert_eq!(work.source["publisher"], "Example Press");
    }

    #[test]
    fn test_parse_work_without_doi_is_skipped() {
        let item = json!({"title": ["No identifier"]});
        assert!(CrossrefClient::parse_work(&item).is_none());
    }

    #[test]
    fn test_parse_work_defaults_title() {
        let item = json!({"DOI": "10.1/a"});
        let work = CrossrefClient::parse_work(&item).unwrap();
        assert_eq!(work.title, "Untitled");
        assert_eq!(work.year, None);
    }

    #[test]
    fn test_parse_page_requires_items() {
        let body = json!({"message": {}});
        let err = CrossrefClient::parse_page(&body).unwrap_err();
        assert!(matches!(err, ServiceError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_page_reports_total() {
        let body = json!({
            "message": {
                "total-results": 240,
                "items": [{"DOI": "10.1/a", "title": ["A"]}]
            }
        });
        let page = CrossrefClient::parse_page(&body).unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_results, Some(240));
    }

    #[test]
    fn test_extract_link_prefers_link_entries() {
        let body = json!({
            "message": {
                "URL": "https://doi.org/10.1/a",
                "link": [{"URL": "https://example.org/fulltext.pdf"}]
            }
        });
        assert_eq!(
            CrossrefClient::extract_link(&body),
            AccessLink::resolved("https://example.org/fulltext.pdf")
        );
    }

    #[test]
    fn test_extract_link_falls_back_to_landing_page() {
        let body = json!({"message": {"URL": "https://doi.org/10.1/a"}});
        assert_eq!(
            CrossrefClient::extract_link(&body),
            AccessLink::resolved("https://doi.org/10.1/a")
        );
    }

    #[test]
    fn test_extract_link_absent() {
        let body = json!({"message": {}});
        assert_eq!(CrossrefClient::extract_link(&body), AccessLink::none());
    }

    #[test]
    fn test_strip_jats_tags() {
        assert_eq!(
            strip_jats_tags("<jats:p>Hello  <jats:italic>world</jats:italic></jats:p>"),
            "Hello world"
        );
        assert_eq!(strip_jats_tags("plain text"), "plain text");
    }
}
