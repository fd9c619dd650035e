use thiserror::Error;
use triage_ai::AiError;
use triage_sources::HelpdeskError;

use crate::session::Phase;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("A {0} phase is already running")]
    Busy(Phase),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Cannot start: {0}")]
    Precondition(String),

    #[error("Helpdesk error: {0}")]
    Source(#[from] HelpdeskError),

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
