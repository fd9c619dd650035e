use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use triage_ai::{GeminiClient, GeminiSettings};
use triage_core::{AnalysisOutcome, PiiSettings, Schema, SelectionTree, Throttle};
use triage_engine::{
    AnalysisJob, AnalyzeOutcome, JobType, Orchestrator, Phase, RunControl, Session,
};
use triage_sources::{HelpdeskClient, HelpdeskSettings};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn helpdesk() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tickets/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ticket": {
                "id": 1,
                "subject": "Outlook crashes for bob@corp.example",
                "description_text": "Crashes on start since the update",
                "status": 2,
                "priority": 1,
                "requester_id": 5,
                "department_id": 9
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/tickets/1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversations": [
                { "body_text": "Reinstalled, no luck", "user_id": 5, "created_at": "2024-05-02T10:00:00Z" },
                { "body_text": "Please send logs", "user_id": 77, "created_at": "2024-05-01T10:00:00Z" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/requesters/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "requester": { "id": 5, "first_name": "Bob", "primary_email": "bob@corp.example" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/departments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "departments": [{ "id": 9, "name": "Finance" }]
        })))
        .mount(&server)
        .await;

    // Ticket 2 is not mounted, so it answers 404 until the attempts run out
    server
}

fn helpdesk_client(server: &MockServer) -> HelpdeskClient {
    HelpdeskClient::new(
        HelpdeskSettings {
            base_url: server.uri(),
            api_key: "hd-key".to_string(),
            max_attempts: 2,
            rate_limit_cooldown: Duration::ZERO,
            timeout: Duration::from_secs(5),
        },
        Throttle::new(Duration::ZERO, Duration::ZERO),
    )
    .unwrap()
}

fn gemini_client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(GeminiSettings {
        base_url: server.uri(),
        api_key: "ai-key".to_string(),
        model: "gemini-test".to_string(),
        max_attempts: 2,
        initial_backoff: Duration::ZERO,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn generation(text: &str) -> Value {
    json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] }, "finishReason": "STOP" }],
        "usageMetadata": { "promptTokenCount": 50, "candidatesTokenCount": 5, "totalTokenCount": 55 }
    })
}

fn schema() -> Schema {
    Schema {
        ticket: SelectionTree::new()
            .include("subject")
            .include("status")
            .include("department_id"),
        conversation: SelectionTree::new().include("body_text").include("created_at"),
        requester: SelectionTree::new().include("first_name"),
    }
}

#[tokio::test]
async fn test_fetch_then_classify_per_ticket() {
    let helpdesk = helpdesk().await;
    let ai = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(generation("```json\n{\"category\": \"Software\"}\n```")),
        )
        .expect(1)
        .mount(&ai)
        .await;

    let orchestrator = Orchestrator::new(RunControl::new())
        .with_schema(schema())
        .with_pii(PiiSettings::default())
        .with_source(Arc::new(helpdesk_client(&helpdesk)))
        .with_generator(Arc::new(gemini_client(&ai)));

    let mut session = Session::new();
    let ids = vec!["1".to_string(), "2".to_string()];
    let summary = orchestrator.fetch(&mut session, &ids).await.unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed, 1);
    assert!(session.fetch_failures[0].error.contains("after 2 attempts"));

    let record = &session.tickets[0];
    assert_eq!(
        record.data,
        json!({
            "subject": "Outlook crashes for [REDACTED_EMAIL]",
            "status": 2,
            "department_id": 9
        })
        .as_object()
        .unwrap()
        .clone()
    );
    assert_eq!(record.requester, Some(json!({ "first_name": "Bob" })));
    assert_eq!(record.department.as_deref(), Some("Finance"));
    assert_eq!(record.analysis_payload.subject, "Outlook crashes for [REDACTED_EMAIL]");
    assert_eq!(record.analysis_payload.conversation[0].body, "Please send logs");
    // description_text was not selected
    assert!(record.analysis_payload.description.is_empty());

    let job = AnalysisJob {
        job_type: JobType::PerTicket,
        prompt: "Return {\"category\": ...} for the ticket.".to_string(),
        attachment: None,
    };
    let outcome = orchestrator.analyze(&mut session, &job).await.unwrap();

    let AnalyzeOutcome::Classified(analyses) = outcome else {
        panic!("expected classifications");
    };
    assert_eq!(
        analyses[0].outcome,
        AnalysisOutcome::Classified {
            classification: json!({ "category": "Software" })
        }
    );
    assert_eq!(session.usage.prompt_tokens, 50);
    assert_eq!(session.phase(), Phase::Idle);

    let requests = ai.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(!body.contains("bob@corp.example"));
    assert!(!body.contains("Crashes on start"));
    assert!(body.contains("Finance"));
}

#[tokio::test]
async fn test_bulk_report_and_token_limit_fallback() {
    let helpdesk = helpdesk().await;
    let ai = MockServer::start().await;
    let answer = "# Weekly report\nOne software issue.\n\nCSV: Category Summary\n```csv\ncategory,count\nSoftware,1\n```\n\nCSV: Ticket Breakdown\n```csv\nticket_id,category\n1,Software\n```";
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(generation(answer)))
        .up_to_n_times(1)
        .mount(&ai)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-test:generateContent"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "message": "Request exceeds the maximum number of tokens allowed" }
        })))
        .mount(&ai)
        .await;

    let orchestrator = Orchestrator::new(RunControl::new())
        .with_schema(schema())
        .with_source(Arc::new(helpdesk_client(&helpdesk)))
        .with_generator(Arc::new(gemini_client(&ai)));

    let mut session = Session::new();
    orchestrator
        .fetch(&mut session, &["1".to_string()])
        .await
        .unwrap();

    let job = AnalysisJob {
        job_type: JobType::Bulk,
        prompt: "Write the weekly report.".to_string(),
        attachment: None,
    };

    let AnalyzeOutcome::Report(report) = orchestrator.analyze(&mut session, &job).await.unwrap()
    else {
        panic!("expected a report");
    };
    assert_eq!(report.markdown_report, "# Weekly report\nOne software issue.");
    let names: Vec<&str> = report.csvs.iter().map(|c| c.filename.as_str()).collect();
    assert_eq!(names, vec!["category_summary.csv", "ticket_breakdown.csv"]);
    assert_eq!(report.csvs[1].content, "ticket_id,category\n1,Software");

    let outcome = orchestrator.analyze(&mut session, &job).await.unwrap();
    match outcome {
        AnalyzeOutcome::ManualFallback { reason, prompt } => {
            assert!(reason.contains("maximum number of tokens"));
            assert!(prompt.starts_with("Write the weekly report."));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // one successful call plus exactly one rejected call
    assert_eq!(ai.received_requests().await.unwrap().len(), 2);
}
