//! Prompt text sent to the model

use serde::Serialize;
use triage_core::{AnalysisPayload, TicketRecord};

#[derive(Serialize)]
struct PromptEntry<'a> {
    #[serde(flatten)]
    payload: &'a AnalysisPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<&'a str>,
}

impl<'a> From<&'a TicketRecord> for PromptEntry<'a> {
    fn from(record: &'a TicketRecord) -> Self {
        Self {
            payload: &record.analysis_payload,
            department: record.department.as_deref(),
        }
    }
}

/// Instructions followed by one ticket
pub fn per_ticket_prompt(instructions: &str, record: &TicketRecord) -> serde_json::Result<String> {
    let body = serde_json::to_string_pretty(&PromptEntry::from(record))?;
    Ok(format!("{}\n\nTicket:\n```json\n{}\n```", instructions.trim(), body))
}

/// Instructions followed by every ticket as one JSON array
pub fn bulk_prompt(instructions: &str, records: &[TicketRecord]) -> serde_json::Result<String> {
    let entries: Vec<PromptEntry<'_>> = records.iter().map(PromptEntry::from).collect();
    let body = serde_json::to_string_pretty(&entries)?;
    Ok(format!(
        "{}\n\nTickets ({}):\n```json\n{}\n```",
        instructions.trim(),
        records.len(),
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn record(id: &str, department: Option<&str>) -> TicketRecord {
        TicketRecord {
            id: id.to_string(),
            data: Map::new(),
            conversations: Vec::new(),
            requester: None,
            department: department.map(str::to_string),
            analysis_payload: AnalysisPayload {
                ticket_id: id.to_string(),
                subject: format!("subject {id}"),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_per_ticket_prompt() {
        let prompt = per_ticket_prompt("  Classify this.\n", &record("7", Some("IT"))).unwrap();

        assert!(prompt.starts_with("Classify this.\n\nTicket:\n```json\n"));
        assert!(prompt.contains(r#""ticket_id": "7""#));
        assert!(prompt.contains(r#""department": "IT""#));
        assert!(prompt.ends_with("```"));
    }

    #[test]
    fn test_bulk_prompt_lists_every_ticket() {
        let prompt = bulk_prompt("Summarise.", &[record("1", None), record("2", None)]).unwrap();

        assert!(prompt.contains("Tickets (2):"));
        assert!(prompt.contains("subject 1"));
        assert!(prompt.contains("subject 2"));
        assert!(!prompt.contains("department"));
    }
}
