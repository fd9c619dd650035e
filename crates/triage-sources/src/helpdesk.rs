//! Helpdesk REST client (Freshservice v2 conventions)
//!
//! Every request goes through the shared retry loop. HTTP 429 raises the
//! shared fetch delay by one increment before the cooldown, so a run that
//! keeps hitting the limit slows itself down.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use triage_core::retry::{self, AttemptError, Backoff, RetryError, RetryPolicy, Throttle};

use crate::handler::{TicketBundle, TicketSource};

const DEPARTMENTS_PER_PAGE: usize = 100;

#[derive(Error, Debug)]
pub enum HelpdeskError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("Failed to fetch {what} after {attempts} attempts: {last}")]
    Exhausted {
        what: String,
        attempts: u32,
        last: String,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, HelpdeskError>;

/// Connection and retry settings for [`HelpdeskClient`]
#[derive(Debug, Clone)]
pub struct HelpdeskSettings {
    /// e.g. `https://acme.freshservice.com/api/v2`
    pub base_url: String,
    pub api_key: String,
    pub max_attempts: u32,
    pub rate_limit_cooldown: Duration,
    pub timeout: Duration,
}

pub struct HelpdeskClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    throttle: Throttle,
    policy: RetryPolicy,
}

impl HelpdeskClient {
    pub fn new(settings: HelpdeskSettings, throttle: Throttle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("triage/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;

        let policy = RetryPolicy {
            max_attempts: settings.max_attempts,
            failure_backoff: Backoff::Throttled(throttle.clone()),
            rate_limit_backoff: Backoff::Fixed(settings.rate_limit_cooldown),
        };

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            throttle,
            policy,
        })
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// `GET /tickets/{id}`
    pub async fn ticket(&self, id: &str, cancel: &CancellationToken) -> Result<Map<String, Value>> {
        let body = self
            .get_json(&format!("ticket {id}"), &format!("/tickets/{id}"), &[], "ticket", cancel)
            .await?;
        match body {
            Value::Object(map) => Ok(map),
            _ => Err(HelpdeskError::Malformed("ticket is not an object".to_string())),
        }
    }

    /// `GET /tickets/{id}/conversations`
    pub async fn conversations(&self, id: &str, cancel: &CancellationToken) -> Result<Vec<Value>> {
        let body = self
            .get_json(
                &format!("conversations for ticket {id}"),
                &format!("/tickets/{id}/conversations"),
                &[("per_page", "100".to_string())],
                "conversations",
                cancel,
            )
            .await?;
        into_array(body, "conversations")
    }

    /// `GET /requesters/{id}`
    pub async fn requester(&self, id: u64, cancel: &CancellationToken) -> Result<Value> {
        self.get_json(
            &format!("requester {id}"),
            &format!("/requesters/{id}"),
            &[],
            "requester",
            cancel,
        )
        .await
    }

    /// `GET /departments`, following pages until a short page comes back
    pub async fn list_departments(&self, cancel: &CancellationToken) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut page = 1;

        loop {
            let body = self
                .get_json(
                    &format!("departments page {page}"),
                    "/departments",
                    &[
                        ("page", page.to_string()),
                        ("per_page", DEPARTMENTS_PER_PAGE.to_string()),
                    ],
                    "departments",
                    cancel,
                )
                .await?;
            let batch = into_array(body, "departments")?;
            let done = batch.len() < DEPARTMENTS_PER_PAGE;
            all.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        info!(count = all.len(), "fetched departments");
        Ok(all)
    }

    /// `GET /ticket_form_fields`
    pub async fn form_fields(&self, cancel: &CancellationToken) -> Result<Vec<Value>> {
        let body = self
            .get_json("ticket form fields", "/ticket_form_fields", &[], "ticket_fields", cancel)
            .await?;
        into_array(body, "ticket_fields")
    }

    /// GET `path` and return the value under the response envelope `key`
    async fn get_json(
        &self,
        what: &str,
        path: &str,
        query: &[(&str, String)],
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let on_rate_limit = |_: &retry::RetryState| {
            let delay = self.throttle.bump();
            info!(delay_ms = retry::millis(delay), "raised fetch delay after rate limit");
        };

        retry::run(&self.policy, cancel, on_rate_limit, |attempt| {
            debug!(url = %url, attempt, "GET");
            self.attempt(&url, query, key)
        })
        .await
        .map_err(|e| match e {
            RetryError::Cancelled => HelpdeskError::Cancelled,
            RetryError::Fatal(e) => e,
            RetryError::Exhausted { attempts, last } => HelpdeskError::Exhausted {
                what: what.to_string(),
                attempts,
                last,
            },
        })
    }

    async fn attempt(
        &self,
        url: &str,
        query: &[(&str, String)],
        key: &str,
    ) -> std::result::Result<Value, AttemptError<HelpdeskError>> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.api_key, Some("X"))
            .query(query)
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.into()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AttemptError::RateLimited(HelpdeskError::RateLimited));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AttemptError::Transient(HelpdeskError::Server {
                status: status.as_u16(),
                body,
            }));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| AttemptError::Transient(HelpdeskError::Malformed(e.to_string())))?;
        take(body, key).map_err(AttemptError::Transient)
    }
}

#[async_trait]
impl TicketSource for HelpdeskClient {
    async fn fetch_ticket(&self, id: &str, cancel: &CancellationToken) -> Result<TicketBundle> {
        let (ticket, conversations) =
            tokio::try_join!(self.ticket(id, cancel), self.conversations(id, cancel))?;

        let requester = match ticket.get("requester_id").and_then(Value::as_u64) {
            Some(requester_id) => match self.requester(requester_id, cancel).await {
                Ok(requester) => Some(requester),
                Err(HelpdeskError::Cancelled) => return Err(HelpdeskError::Cancelled),
                Err(e) => {
                    warn!(ticket = id, requester_id, "requester lookup failed: {}", e);
                    None
                }
            },
            None => None,
        };

        Ok(TicketBundle {
            id: id.to_string(),
            ticket,
            conversations,
            requester,
        })
    }

    async fn departments(&self, cancel: &CancellationToken) -> Result<Vec<Value>> {
        self.list_departments(cancel).await
    }

    fn fetch_delay(&self) -> Duration {
        self.throttle.current()
    }
}

fn take(body: Value, key: &str) -> Result<Value> {
    match body {
        Value::Object(mut map) => map
            .remove(key)
            .ok_or_else(|| HelpdeskError::Malformed(format!("missing `{key}` in response"))),
        _ => Err(HelpdeskError::Malformed("response is not an object".to_string())),
    }
}

fn into_array(body: Value, key: &str) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        _ => Err(HelpdeskError::Malformed(format!("`{key}` is not an array"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{basic_auth, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, max_attempts: u32) -> HelpdeskClient {
        HelpdeskClient::new(
            HelpdeskSettings {
                base_url: format!("{}/api/v2", server.uri()),
                api_key: "secret-key".to_string(),
                max_attempts,
                rate_limit_cooldown: Duration::ZERO,
                timeout: Duration::from_secs(5),
            },
            Throttle::new(Duration::ZERO, Duration::from_millis(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ticket_bundle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/100"))
            .and(basic_auth("secret-key", "X"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ticket": { "id": 100, "subject": "VPN down", "requester_id": 9 }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/100/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [{ "body_text": "hi", "incoming": true }]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/requesters/9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "requester": { "first_name": "Ada" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let bundle = client(&server, 3)
            .fetch_ticket("100", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bundle.ticket["subject"], json!("VPN down"));
        assert_eq!(bundle.conversations.len(), 1);
        assert_eq!(bundle.requester, Some(json!({ "first_name": "Ada" })));
    }

    #[tokio::test]
    async fn test_always_failing_exhausts_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/7"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let err = client(&server, 3)
            .ticket("7", &CancellationToken::new())
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("after 3 attempts"), "{message}");
        assert!(message.contains("500"));
    }

    #[tokio::test]
    async fn test_rate_limit_bumps_throttle_and_shares_budget() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/8"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let client = client(&server, 2);
        let err = client.ticket("8", &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, HelpdeskError::Exhausted { attempts: 2, .. }));
        assert_eq!(client.fetch_delay(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/9"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/tickets/9"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "ticket": { "id": 9 } })),
            )
            .mount(&server)
            .await;

        let ticket = client(&server, 3)
            .ticket("9", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(ticket["id"], json!(9));
    }

    #[tokio::test]
    async fn test_departments_pagination() {
        let server = MockServer::start().await;
        let full_page: Vec<Value> = (0..DEPARTMENTS_PER_PAGE)
            .map(|i| json!({ "id": i, "name": format!("Dept {i}") }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/v2/departments"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "departments": full_page })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v2/departments"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "departments": [{ "id": 500, "name": "Finance" }]
            })))
            .mount(&server)
            .await;

        let departments = client(&server, 1)
            .list_departments(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(departments.len(), DEPARTMENTS_PER_PAGE + 1);
    }

    #[tokio::test]
    async fn test_missing_envelope_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/ticket_form_fields"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "fields": [] })))
            .mount(&server)
            .await;

        let err = client(&server, 1)
            .form_fields(&CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ticket form fields"));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let server = MockServer::start().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client(&server, 3).ticket("1", &cancel).await.unwrap_err();
        assert!(matches!(err, HelpdeskError::Cancelled));
    }
}
