//! Content generator trait and the error taxonomy shared by model clients

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use triage_tokens::TokenUsage;

/// Phrase upstream uses when a response would not fit the output budget
pub const TOKEN_LIMIT_PHRASE: &str = "exceeds the maximum number of tokens";

#[derive(Error, Debug)]
pub enum AiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("unexpected response: {0}")]
    Malformed(String),

    #[error("Response exceeds the maximum number of tokens: {0}")]
    TokenLimit(String),

    #[error("AI request failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl AiError {
    /// Errors that abort a whole analysis phase instead of one ticket
    pub fn is_fatal(&self) -> bool {
        matches!(self, AiError::TokenLimit(_) | AiError::Exhausted { .. })
    }
}

pub type Result<T> = std::result::Result<T, AiError>;

/// A file uploaded to the model provider, referenced from prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    /// Ask for `application/json` output
    pub json_mode: bool,
    pub attachment: Option<UploadedFile>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn json(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            json_mode: true,
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, file: UploadedFile) -> Self {
        self.attachment = Some(file);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// Trait for model backends the orchestrator can drive
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation>;

    async fn count_tokens(&self, text: &str, cancel: &CancellationToken) -> Result<u64>;

    /// Model identifier requests are sent to
    fn model(&self) -> &str;
}
