//! Google Gemini API client.
//!
//! Implements [`InsightModel`] against the Gemini `generateContent`
//! endpoint. Auth is a `?key=` query parameter; the request body carries
//! `contents` and `generationConfig` in Gemini's native shape. Only the
//! non-streaming path is needed here: one prompt in, one text candidate out.

use super::InsightModel;
use crate::client::ServiceClient;
use crate::config::{Credentials, LlmConfig, RetryConfig};
use crate::error::ServiceError;
use async_trait::async_trait;
use serde_json::{Value, json};

pub struct GeminiClient {
    client: ServiceClient,
    base_url: String,
    model: String,
    api_key: String,
    max_output_tokens: usize,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(
        config: &LlmConfig,
        retry: RetryConfig,
        credentials: &Credentials,
    ) -> Result<Self, ServiceError> {
        let user_agent = format!("sysrev/{}", env!("CARGO_PKG_VERSION"));
        let client = ServiceClient::new(retry, config.request_timeout_secs, &user_agent)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: credentials.llm_api_key.clone(),
            max_output_tokens: config.max_output_tokens,
            temperature: config.temperature,
        })
    }

    fn build_request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "maxOutputTokens": self.max_output_tokens,
                "temperature": self.temperature,
            },
        })
    }

    /// Concatenate the text parts of the first candidate.
    fn parse_response(body: &Value) -> Result<String, ServiceError> {
        let parts = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| ServiceError::MalformedResponse {
                message: "no candidates with content parts".into(),
            })?;

        let text: String = parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(ServiceError::MalformedResponse {
                message: "candidate contains no text parts".into(),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl InsightModel for GeminiClient {
    async fn extract(&self, prompt: &str) -> Result<String, ServiceError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = self.build_request_body(prompt);
        let response = self.client.post_json(&url, &body).await?;
        Self::parse_response(&response)
    }
}

/// Strip a Markdown code fence from model output, if present.
///
/// Models routinely wrap JSON answers in ```json fences even when asked
/// not to; accept bare JSON, ```json-fenced, and plain ```-fenced forms.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
