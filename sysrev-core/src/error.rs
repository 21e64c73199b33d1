//! Error types for the sysrev core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering configuration, external-service, and pipeline domains.
//!
//! The taxonomy mirrors how failures propagate: `ConfigError` is fatal and
//! raised before any network call; `ServiceError` describes a single
//! external-call outcome and is classified as transient or permanent for the
//! retry client; `SysrevError` is the top-level type returned by the
//! orchestrator, where only stage-level failures surface (item-scoped
//! failures are captured into `StageFailure` records instead).

use crate::types::{FailureKind, StageName};

/// Top-level error type for the sysrev core library.
#[derive(Debug, thiserror::Error)]
pub enum SysrevError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: StageName,
        #[source]
        source: ServiceError,
    },
}

/// Errors from the configuration system.
///
/// All variants are fatal and non-retryable; they are raised before the
/// orchestrator enters `Retrieving`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Environment variable not set: {var}")]
    MissingCredential { var: String },

    #[error("Invalid inclusion criterion '{name}': {reason}")]
    InvalidCriterion { name: String, reason: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from a single external-service interaction.
///
/// `Timeout`, `Connection`, and retryable `Status` codes (5xx, 429) are
/// transient; the retry client converts exhausted retries into
/// `Unavailable`. Everything else returns immediately.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Service returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Authentication rejected: {message}")]
    Auth { message: String },

    #[error("Request rejected as malformed: {message}")]
    BadRequest { message: String },

    #[error("Response failed structural validation: {message}")]
    MalformedResponse { message: String },

    #[error("Service unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    #[error("Cancelled by run deadline")]
    Cancelled,
}

impl ServiceError {
    /// Whether this error is transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Timeout { .. } | ServiceError::Connection { .. } => true,
            ServiceError::Status { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }

    /// The failure kind recorded in the report for this error.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ServiceError::MalformedResponse { .. } => FailureKind::MalformedResponse,
            ServiceError::Cancelled => FailureKind::Cancelled,
            ServiceError::Auth { .. } | ServiceError::BadRequest { .. } => {
                FailureKind::Configuration
            }
            _ => FailureKind::ServiceUnavailable,
        }
    }
}

/// A type alias for results using the top-level `SysrevError`.
pub type Result<T> = std::result::Result<T, SysrevError>;
