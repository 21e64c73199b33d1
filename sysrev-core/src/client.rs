//! Uniform resilience wrapper around external-service calls.
//!
//! Every network interaction in the pipeline goes through [`with_retry`]:
//! transient failures (timeouts, connection resets, 5xx/429 statuses) are
//! retried with exponential backoff plus jitter; permanent failures (auth,
//! malformed requests, parse errors) return immediately. Exhausting the
//! retry budget yields [`ServiceError::Unavailable`] carrying the last
//! underlying error. The wrapper is stateless across invocations.

use crate::config::RetryConfig;
use crate::error::ServiceError;
use std::future::Future;
use std::time::Duration;

/// Execute an async operation with exponential backoff retry on transient
/// errors.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T, ServiceError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let mut last_err: Option<ServiceError> = None;
    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !e.is_retryable() {
                    return Err(e);
                }
                if attempt == config.max_retries {
                    last_err = Some(e);
                    break;
                }

                let backoff_ms = compute_backoff(config, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max = config.max_retries,
                    backoff_ms = backoff_ms,
                    error = %e,
                    "Retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                last_err = Some(e);
            }
        }
    }

    Err(ServiceError::Unavailable {
        attempts: config.max_retries + 1,
        last_error: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string()),
    })
}

/// Pure exponential backoff with optional jitter.
fn compute_backoff(config: &RetryConfig, attempt: u32) -> u64 {
    let base = config.initial_backoff_ms as f64 * config.backoff_multiplier.powi(attempt as i32);
    let capped = base.min(config.max_backoff_ms as f64) as u64;
    if config.jitter {
        // Add up to 25% jitter to avoid thundering-herd synchronization
        // when multiple items retry concurrently.
        let jitter = (capped as f64 * 0.25 * rand_simple()) as u64;
        capped + jitter
    } else {
        capped
    }
}

/// Simple deterministic pseudo-random for jitter (avoids pulling in rand crate).
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// HTTP transport shared by the service clients.
///
/// Owns the `reqwest::Client`, applies per-call timeouts, and classifies
/// transport and status failures into [`ServiceError`] variants so the
/// retry wrapper can tell transient from permanent.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    retry: RetryConfig,
    timeout: Duration,
}

impl ServiceClient {
    /// Build a client with the given retry policy, per-call timeout, and
    /// User-Agent string.
    pub fn new(
        retry: RetryConfig,
        timeout_secs: u64,
        user_agent: &str,
    ) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(|e| ServiceError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            retry,
            timeout,
        })
    }

    /// GET a JSON document, retrying transient failures.
    pub async fn get_json(&self, url: &str) -> Result<serde_json::Value, ServiceError> {
        with_retry(&self.retry, || async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| self.classify_transport(e))?;
            self.read_json(response).await
        })
        .await
    }

    /// POST a JSON payload and read a JSON document back, retrying
    /// transient failures.
    pub async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, ServiceError> {
        with_retry(&self.retry, || async {
            let response = self
                .http
                .post(url)
                .json(payload)
                .send()
                .await
                .map_err(|e| self.classify_transport(e))?;
            self.read_json(response).await
        })
        .await
    }

    fn classify_transport(&self, err: reqwest::Error) -> ServiceError {
        if err.is_timeout() {
            ServiceError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if err.is_builder() || err.is_request() {
            ServiceError::BadRequest {
                message: err.to_string(),
            }
        } else {
            ServiceError::Connection {
                message: err.to_string(),
            }
        }
    }

    async fn read_json(&self, response: reqwest::Response) -> Result<serde_json::Value, ServiceError> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Auth {
                message: truncate(&body, 200),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                code: status.as_u16(),
                message: truncate(&body, 200),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ServiceError::MalformedResponse {
                message: format!("body is not valid JSON: {e}"),
            })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}
