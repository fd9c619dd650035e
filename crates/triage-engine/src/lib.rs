//! Fetch and analyze phases over a ticket session
//!
//! A [`Session`] holds everything one run produces. The [`Orchestrator`]
//! drives it: tickets are fetched one at a time, projected through the
//! field selection, scrubbed, and then sent to the model either one by one
//! or all together. [`RunControl`] lets another task pause or cancel the
//! running phase between items.

pub mod control;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod prompt;
pub mod session;

pub use control::RunControl;
pub use error::{EngineError, Result};
pub use extract::{Extractor, department_names};
pub use orchestrator::{
    AnalysisJob, AnalyzeOutcome, Estimate, EstimateSource, FetchSummary, JobType, Orchestrator,
};
pub use prompt::{bulk_prompt, per_ticket_prompt};
pub use session::{FetchFailure, Phase, Session};
