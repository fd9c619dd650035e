//! Gemini `v1beta` REST client
//!
//! Every call goes through the shared retry loop with exponential backoff; rate-limit waits and failure waits double
//! independently but draw from one attempt budget. A response that would
//! exceed the model's output budget is fatal and never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use triage_core::retry::{self, AttemptError, Backoff, RetryError, RetryPolicy};
use triage_tokens::TokenUsage;

use crate::generator::{
    AiError, ContentGenerator, GenerateRequest, Generation, Result, TOKEN_LIMIT_PHRASE,
    UploadedFile,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

/// A model as listed by `GET /v1beta/models`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub input_token_limit: Option<u64>,
    #[serde(default)]
    pub output_token_limit: Option<u64>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generation(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelsPage {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    policy: RetryPolicy,
}

impl GeminiClient {
    pub fn new(settings: GeminiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("triage/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()?;

        let backoff = Backoff::Exponential {
            initial: settings.initial_backoff,
        };
        let policy = RetryPolicy {
            max_attempts: settings.max_attempts,
            failure_backoff: backoff.clone(),
            rate_limit_backoff: backoff,
        };

        let model = settings
            .model
            .strip_prefix("models/")
            .unwrap_or(&settings.model)
            .to_string();

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            model,
            policy,
        })
    }

    /// Every model visible to the API key, across pages
    pub async fn list_models(&self, cancel: &CancellationToken) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/v1beta/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let raw = self
                .with_retry(cancel, |attempt| {
                    debug!(attempt, "list models");
                    let mut request = self
                        .client
                        .get(&url)
                        .query(&[("key", self.api_key.as_str()), ("pageSize", "100")]);
                    if let Some(token) = &page_token {
                        request = request.query(&[("pageToken", token.as_str())]);
                    }
                    self.send_once(request)
                })
                .await?;
            let page: ModelsPage =
                serde_json::from_value(raw).map_err(|e| AiError::Malformed(e.to_string()))?;
            models.extend(page.models);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(count = models.len(), "listed models");
        Ok(models)
    }

    /// Upload a file so later prompts can reference it
    pub async fn upload_file(
        &self,
        display_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<UploadedFile> {
        let url = format!("{}/upload/v1beta/files", self.base_url);
        let metadata = json!({ "file": { "display_name": display_name } }).to_string();

        let raw = self
            .with_retry(cancel, |attempt| {
                debug!(attempt, file = display_name, "upload");
                // the form is consumed by each send
                let form = upload_form(&metadata, display_name, mime_type, bytes.clone());
                let url = &url;
                async move {
                    let form = form.map_err(|e| AttemptError::Fatal(AiError::Http(e)))?;
                    let request = self
                        .client
                        .post(url)
                        .query(&[("key", self.api_key.as_str())])
                        .header("X-Goog-Upload-Protocol", "multipart")
                        .multipart(form);
                    self.send_once(request).await
                }
            })
            .await?;

        let uploaded: UploadResponse =
            serde_json::from_value(raw).map_err(|e| AiError::Malformed(e.to_string()))?;
        info!(name = %uploaded.file.name, "uploaded file");
        Ok(uploaded.file)
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, action)
    }

    async fn with_retry<T, F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, AttemptError<AiError>>>,
    {
        retry::run(&self.policy, cancel, |_| {}, op)
            .await
            .map_err(|e| match e {
                RetryError::Cancelled => AiError::Cancelled,
                RetryError::Fatal(e) => e,
                RetryError::Exhausted { attempts, last } => AiError::Exhausted { attempts, last },
            })
    }

    async fn post_once(
        &self,
        url: &str,
        body: &Value,
    ) -> std::result::Result<Value, AttemptError<AiError>> {
        let request = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(body);
        self.send_once(request).await
    }

    /// Send one request and sort a failure into retryable or fatal
    async fn send_once(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<Value, AttemptError<AiError>> {
        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transient(e.into()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(AttemptError::RateLimited(AiError::RateLimited));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.to_lowercase().contains(TOKEN_LIMIT_PHRASE) {
                return Err(AttemptError::Fatal(AiError::TokenLimit(error_message(&body))));
            }
            return Err(AttemptError::Transient(AiError::Server {
                status: status.as_u16(),
                body,
            }));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| AttemptError::Transient(AiError::Malformed(e.to_string())))
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(
        &self,
        request: &GenerateRequest,
        cancel: &CancellationToken,
    ) -> Result<Generation> {
        let url = self.endpoint("generateContent");
        let body = generate_body(request);

        self.with_retry(cancel, |attempt| {
            debug!(model = %self.model, attempt, json_mode = request.json_mode, "generateContent");
            let url = &url;
            let body = &body;
            async move {
                let raw = self.post_once(url, body).await?;
                parse_generation(raw)
            }
        })
        .await
    }

    async fn count_tokens(&self, text: &str, cancel: &CancellationToken) -> Result<u64> {
        let url = self.endpoint("countTokens");
        let body = json!({ "contents": [{ "parts": [{ "text": text }] }] });

        self.with_retry(cancel, |_| {
            let url = &url;
            let body = &body;
            async move {
                let raw = self.post_once(url, body).await?;
                serde_json::from_value::<CountTokensResponse>(raw)
                    .map(|r| r.total_tokens)
                    .map_err(|e| AttemptError::Transient(AiError::Malformed(e.to_string())))
            }
        })
        .await
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn generate_body(request: &GenerateRequest) -> Value {
    let mut parts = Vec::new();
    if let Some(file) = &request.attachment {
        parts.push(json!({ "fileData": { "mimeType": file.mime_type, "fileUri": file.uri } }));
    }
    parts.push(json!({ "text": request.prompt }));

    let mut body = json!({ "contents": [{ "role": "user", "parts": parts }] });
    if request.json_mode {
        body["generationConfig"] = json!({ "responseMimeType": "application/json" });
    }
    body
}

fn parse_generation(raw: Value) -> std::result::Result<Generation, AttemptError<AiError>> {
    let response: GenerateResponse = serde_json::from_value(raw)
        .map_err(|e| AttemptError::Transient(AiError::Malformed(e.to_string())))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(AttemptError::Transient(AiError::Malformed(
            "no candidates in response".to_string(),
        )));
    };

    if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
        return Err(AttemptError::Fatal(AiError::TokenLimit(
            "generation stopped at the output token limit".to_string(),
        )));
    }

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AttemptError::Transient(AiError::Malformed(format!(
            "empty response (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))));
    }

    let usage = response.usage_metadata.unwrap_or_default();
    Ok(Generation {
        text,
        usage: TokenUsage {
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        },
    })
}

/// Pull `error.message` out of an API error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

fn upload_form(
    metadata: &str,
    display_name: &str,
    mime_type: &str,
    bytes: Vec<u8>,
) -> reqwest::Result<multipart::Form> {
    Ok(multipart::Form::new()
        .part(
            "metadata",
            multipart::Part::text(metadata.to_string()).mime_str("application/json")?,
        )
        .part(
            "file",
            multipart::Part::bytes(bytes)
                .file_name(display_name.to_string())
                .mime_str(mime_type)?,
        ))
}
