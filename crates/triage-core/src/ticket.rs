//! Ticket records and the analysis payload sent to the model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A fetched ticket after field selection and scrubbing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub id: String,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub conversations: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    pub analysis_payload: AnalysisPayload,
}

/// Who wrote a conversation entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorRole {
    Requester,
    Agent,
    AgentNote,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: AuthorRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    pub body: String,
}

/// Reduced projection of a ticket used for classification prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub ticket_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation: Vec<ConversationTurn>,
}

impl AnalysisPayload {
    /// Build the payload from a filtered and scrubbed ticket object and its
    /// conversations. Only selected fields can appear; a turn whose body was
    /// not selected is left out.
    ///
    /// Turns are sorted by `created_at`; entries whose timestamp does not
    /// parse keep their relative order after every dated entry.
    pub fn build(ticket_id: &str, ticket: &Map<String, Value>, conversations: &[Value]) -> Self {
        let requester_id = ticket.get("requester_id").and_then(Value::as_u64);

        let mut dated: Vec<(Option<OffsetDateTime>, ConversationTurn)> = conversations
            .iter()
            .filter_map(Value::as_object)
            .map(|entry| {
                let created_at = entry.get("created_at").and_then(Value::as_str);
                let parsed = created_at.and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok());
                let turn = ConversationTurn {
                    role: role_of(entry, requester_id),
                    created_at: created_at.map(str::to_string),
                    body: text_field(entry, &["body_text", "body"]),
                };
                (parsed, turn)
            })
            .filter(|(_, turn)| !turn.body.is_empty())
            .collect();

        // `None` sorts first for Option, so key undated entries explicitly
        dated.sort_by_key(|(at, _)| (at.is_none(), *at));

        Self {
            ticket_id: ticket_id.to_string(),
            subject: text_field(ticket, &["subject"]),
            description: text_field(ticket, &["description_text", "description"]),
            conversation: dated.into_iter().map(|(_, turn)| turn).collect(),
        }
    }
}

fn role_of(entry: &Map<String, Value>, requester_id: Option<u64>) -> AuthorRole {
    let flag = |key: &str| entry.get(key).and_then(Value::as_bool).unwrap_or(false);

    if flag("private") {
        return AuthorRole::AgentNote;
    }
    let from_requester = match (entry.get("user_id").and_then(Value::as_u64), requester_id) {
        (Some(user), Some(requester)) => user == requester,
        _ => false,
    };
    if flag("incoming") || from_requester {
        AuthorRole::Requester
    } else {
        AuthorRole::Agent
    }
}

fn text_field(map: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|k| map.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_sorts_and_tags_turns() {
        let ticket = json!({
            "subject": " Printer jam ",
            "description_text": "Paper stuck in tray 2",
            "description": "<p>Paper stuck in tray 2</p>",
            "requester_id": 42
        });
        let conversations = vec![
            json!({ "body_text": "Fixed it", "user_id": 7, "created_at": "2024-03-02T09:00:00Z" }),
            json!({ "body_text": "Still broken", "user_id": 42, "created_at": "2024-03-01T12:00:00Z" }),
            json!({ "body_text": "Escalating", "private": true, "created_at": "2024-03-01T15:30:00+02:00" }),
            json!({ "body_text": "Any update?", "incoming": true, "created_at": "yesterday" }),
        ];

        let payload =
            AnalysisPayload::build("100", ticket.as_object().unwrap(), &conversations);

        assert_eq!(payload.subject, "Printer jam");
        assert_eq!(payload.description, "Paper stuck in tray 2");
        let bodies: Vec<&str> = payload.conversation.iter().map(|t| t.body.as_str()).collect();
        assert_eq!(bodies, vec!["Still broken", "Escalating", "Fixed it", "Any update?"]);

        let roles: Vec<AuthorRole> = payload.conversation.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                AuthorRole::Requester,
                AuthorRole::AgentNote,
                AuthorRole::Agent,
                AuthorRole::Requester
            ]
        );
    }

    #[test]
    fn test_payload_with_missing_fields() {
        let payload = AnalysisPayload::build("5", &Map::new(), &[json!("not an object")]);

        assert_eq!(payload.ticket_id, "5");
        assert!(payload.subject.is_empty());
        assert!(payload.conversation.is_empty());
    }

    #[test]
    fn test_unselected_text_is_left_out() {
        let ticket = json!({ "status": 2 });
        let conversations = vec![json!({ "user_id": 42, "created_at": "2024-03-01T12:00:00Z" })];

        let payload = AnalysisPayload::build("8", ticket.as_object().unwrap(), &conversations);

        assert!(payload.conversation.is_empty());
        assert_eq!(serde_json::to_value(&payload).unwrap(), json!({ "ticket_id": "8" }));
    }
}
