//! # Sysrev Core
//!
//! Core library for the sysrev systematic-review pipeline.
//! Provides the stage data contracts, the retrying external-service client,
//! the four review stages (retrieval, prescreen, link resolution,
//! synthesis), and the orchestrator that sequences them into a run.

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod question;
pub mod services;
pub mod stages;
pub mod types;

// Re-export commonly used types at the crate root.
pub use config::{Credentials, Criterion, ReviewConfig, RetryConfig, load_config};
pub use error::{ConfigError, Result, ServiceError, SysrevError};
pub use pipeline::PipelineOrchestrator;
pub use question::ResearchQuestion;
pub use services::{
    CrossrefClient, GeminiClient, InsightModel, LiteratureSearch, MockInsightModel,
    MockLiteratureSearch, SearchPage,
};
pub use types::{
    AccessLink, CandidateWork, FailureKind, InclusionVerdict, PipelineReport, ReportEntry,
    RunState, StageFailure, StageName, SynthesisResult,
};

// Re-export for downstream implementations of the service traits.
pub use async_trait::async_trait;
