//! The four pipeline stages.
//!
//! Each stage consumes the surviving subset of the previous stage's output
//! and records its results through the shared annotation map and failure
//! list. Item-scoped failures never abort a stage; stage-level failures are
//! returned as errors and escalate the run.

pub mod links;
pub mod prescreen;
pub mod retrieval;
pub mod synthesis;

pub use links::LinkResolutionStage;
pub use prescreen::PrescreenStage;
pub use retrieval::{RetrievalOutcome, RetrievalStage};
pub use synthesis::SynthesisStage;
