//! Configuration system for sysrev.
//!
//! Uses `figment` for layered configuration: defaults -> `sysrev.toml` ->
//! `SYSREV_*` environment variables (e.g. `SYSREV_PIPELINE__MAX_RESULTS`).
//!
//! Credentials are resolved exactly once at startup into a [`Credentials`]
//! value that is passed by reference into the service clients; no component
//! reads ambient environment state after that point.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a review run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub search: SearchApiConfig,
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub prescreen: PrescreenConfig,
    pub pipeline: PipelineConfig,
}

impl ReviewConfig {
    /// Validate the configuration. Malformed predicate configuration is a
    /// fatal error raised before the pipeline starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for criterion in &self.prescreen.criteria {
            criterion.validate()?;
        }
        if self.pipeline.concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "pipeline.concurrency must be at least 1".into(),
            });
        }
        if self.pipeline.page_size == 0 {
            return Err(ConfigError::Invalid {
                message: "pipeline.page_size must be at least 1".into(),
            });
        }
        if self.pipeline.max_results == 0 {
            return Err(ConfigError::Invalid {
                message: "pipeline.max_results must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Literature-search API (Crossref) endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchApiConfig {
    /// Base URL of the Crossref-compatible works API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for SearchApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crossref.org".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Language-model inference service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the Gemini-compatible API.
    pub base_url: String,
    /// Model identifier (e.g. "gemini-2.5-flash").
    pub model: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum tokens to generate per extraction.
    pub max_output_tokens: usize,
    /// Sampling temperature for extraction calls.
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash".to_string(),
            request_timeout_secs: 60,
            max_output_tokens: 1024,
            temperature: 0.2,
        }
    }
}

/// Retry policy applied to every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Multiplier applied per attempt.
    pub backoff_multiplier: f64,
    /// Cap on any single backoff delay.
    pub max_backoff_ms: u64,
    /// Whether to add jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 30_000,
            jitter: true,
        }
    }
}

/// Ordered inclusion criteria applied by the prescreen stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrescreenConfig {
    pub criteria: Vec<Criterion>,
}

impl Default for PrescreenConfig {
    fn default() -> Self {
        Self {
            criteria: vec![Criterion::RequireAbstract],
        }
    }
}

/// One inclusion predicate. Evaluated in configured order with
/// short-circuit on the first failure; the predicate's name becomes the
/// rejection rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Criterion {
    /// Publication year must be present and at least `year`.
    MinYear { year: i32 },
    /// Abstract must be present and non-empty.
    RequireAbstract,
    /// Title or abstract must contain `term` (case-insensitive).
    RequireKeyword { term: String },
}

impl Criterion {
    /// The rationale string recorded when this predicate rejects a candidate.
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::MinYear { .. } => "min_year",
            Criterion::RequireAbstract => "require_abstract",
            Criterion::RequireKeyword { .. } => "require_keyword",
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Criterion::MinYear { year } if *year <= 0 => Err(ConfigError::InvalidCriterion {
                name: "min_year".into(),
                reason: format!("year must be positive, got {year}"),
            }),
            Criterion::RequireKeyword { term } if term.trim().is_empty() => {
                Err(ConfigError::InvalidCriterion {
                    name: "require_keyword".into(),
                    reason: "term must be non-empty".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Orchestrator-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Cap on total retrieved candidates across pages.
    pub max_results: usize,
    /// Results requested per search page.
    pub page_size: usize,
    /// Bounded worker pool size for per-item stages.
    pub concurrency: usize,
    /// Optional whole-run deadline in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            page_size: 20,
            concurrency: 5,
            deadline_secs: None,
        }
    }
}

/// Load configuration from defaults, an optional TOML file, and the
/// `SYSREV_*` environment (e.g. `SYSREV_LLM__MODEL`).
pub fn load_config(config_file: Option<&Path>) -> Result<ReviewConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ReviewConfig::default()));

    match config_file {
        Some(path) => figment = figment.merge(Toml::file(path)),
        None => {
            let default_path = Path::new("sysrev.toml");
            if default_path.exists() {
                figment = figment.merge(Toml::file(default_path));
            }
        }
    }

    figment = figment.merge(Env::prefixed("SYSREV_").split("__"));

    let config: ReviewConfig = figment.extract().map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Environment variable holding the Gemini API key.
pub const LLM_KEY_ENV: &str = "GEMINI_API_KEY";
/// Fallback environment variable for the Gemini API key.
pub const LLM_KEY_FALLBACK_ENV: &str = "GOOGLE_API_KEY";
/// Environment variable holding the contact e-mail sent to the search API
/// (Crossref polite pool).
pub const SEARCH_MAILTO_ENV: &str = "SYSREV_MAILTO";

/// Credentials for both external services, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub llm_api_key: String,
    pub contact_email: String,
}

impl Credentials {
    /// Resolve credentials from the process environment. Absence of either
    /// credential is fatal and reported before any network call is made.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|var| std::env::var(var).ok())
    }

    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let llm_api_key = lookup(LLM_KEY_ENV)
            .or_else(|| lookup(LLM_KEY_FALLBACK_ENV))
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                var: format!("{LLM_KEY_ENV} (or {LLM_KEY_FALLBACK_ENV})"),
            })?;

        let contact_email = lookup(SEARCH_MAILTO_ENV)
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                var: SEARCH_MAILTO_ENV.to_string(),
            })?;

        Ok(Self {
            llm_api_key,
            contact_email,
        })
    }
}
