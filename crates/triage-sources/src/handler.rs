//! Ticket source trait

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::helpdesk::Result;

/// Everything fetched for one ticket, before selection and scrubbing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketBundle {
    pub id: String,
    pub ticket: Map<String, Value>,
    pub conversations: Vec<Value>,
    pub requester: Option<Value>,
}

/// Trait for the upstream that tickets are pulled from
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Fetch a ticket with its conversations and requester
    async fn fetch_ticket(&self, id: &str, cancel: &CancellationToken) -> Result<TicketBundle>;

    /// Every department, across all pages
    async fn departments(&self, cancel: &CancellationToken) -> Result<Vec<Value>>;

    /// Delay to leave between two successful ticket fetches
    fn fetch_delay(&self) -> Duration;
}
