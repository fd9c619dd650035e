//! Core domain models and logic for triage
//!
//! This crate contains:
//! - Selection trees and the schema filter
//! - Ticket records and the analysis payload
//! - The retry/backoff state machine shared by both upstream clients
//! - Report assembly and CSV/JSON export

pub mod analysis;
pub mod error;
pub mod export;
pub mod pii;
pub mod report;
pub mod retry;
pub mod selection;
pub mod ticket;

pub use analysis::{AnalysisOutcome, TicketAnalysis, parse_json_response};
pub use error::{Error, Result};
pub use pii::{PiiCategory, PiiSettings};
pub use report::{AssembledReport, CsvSection, ReportAssembler};
pub use retry::{AttemptError, Backoff, RetryError, RetryPolicy, Throttle, millis};
pub use selection::{Schema, Selection, SelectionTree, filter, filter_value};
pub use ticket::{AnalysisPayload, AuthorRole, ConversationTurn, TicketRecord};
