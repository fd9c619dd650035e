use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result of classifying one ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketAnalysis {
    pub ticket_id: String,
    #[serde(flatten)]
    pub outcome: AnalysisOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Classified { classification: Value },
    Failed { error: String },
}

impl TicketAnalysis {
    pub fn classified(ticket_id: impl Into<String>, classification: Value) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            outcome: AnalysisOutcome::Classified { classification },
        }
    }

    pub fn failed(ticket_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            outcome: AnalysisOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, AnalysisOutcome::Failed { .. })
    }
}

/// Parse a model response as JSON, tolerating a surrounding code fence
pub fn parse_json_response(text: &str) -> Result<Value, serde_json::Error> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```")
        .map(|rest| {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.trim_end().strip_suffix("```").unwrap_or(rest)
        })
        .unwrap_or(trimmed);
    serde_json::from_str(inner.trim())
}
