use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use triage_core::{PiiSettings, Schema, SelectionTree};

/// Persisted settings for triage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub helpdesk: HelpdeskConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub pii: PiiSettings,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub pricing: PricingConfig,

    #[serde(default)]
    pub report: ReportConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    /// e.g. `acme.freshservice.com`
    #[serde(default)]
    pub domain: String,

    #[serde(default)]
    pub api_key: String,

    /// Overrides `https://<domain>/api/v2`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between two successful ticket fetches; raised on every 429
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_ms: u64,

    #[serde(default = "default_cooldown")]
    pub rate_limit_cooldown_ms: u64,

    #[serde(default = "default_increment")]
    pub rate_limit_delay_increment_ms: u64,

    #[serde(default = "default_ai_backoff")]
    pub ai_initial_backoff_ms: u64,
}

/// Wrapper so the schema section gets its defaults when absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaConfig(pub Schema);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_input_price")]
    pub input_per_million: f64,

    #[serde(default = "default_output_price")]
    pub output_per_million: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Labels of the CSV sections the bulk report is split on
    #[serde(default = "default_section_labels")]
    pub section_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `<data dir>/prompts`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: None,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            fetch_delay_ms: default_fetch_delay(),
            rate_limit_cooldown_ms: default_cooldown(),
            rate_limit_delay_increment_ms: default_increment(),
            ai_initial_backoff_ms: default_ai_backoff(),
        }
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self(default_schema())
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: default_input_price(),
            output_per_million: default_output_price(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            section_labels: default_section_labels(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_fetch_delay() -> u64 {
    1_000
}

fn default_cooldown() -> u64 {
    60_000
}

fn default_increment() -> u64 {
    250
}

fn default_ai_backoff() -> u64 {
    2_000
}

fn default_input_price() -> f64 {
    0.30
}

fn default_output_price() -> f64 {
    2.50
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_section_labels() -> Vec<String> {
    triage_core::report::DEFAULT_SECTION_LABELS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn tree(keys: &[&str]) -> SelectionTree {
    keys.iter().fold(SelectionTree::new(), |t, k| t.include(*k))
}

fn default_schema() -> Schema {
    Schema {
        ticket: tree(&[
            "subject",
            "description_text",
            "status",
            "priority",
            "category",
            "sub_category",
            "department_id",
            "requester_id",
            "created_at",
            "custom_fields",
        ]),
        conversation: tree(&["body_text", "incoming", "private", "user_id", "created_at"]),
        requester: tree(&["name", "department_ids"]),
    }
}

impl Config {
    /// Load config from default location or create default if not found
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get config file path
    pub fn config_path() -> PathBuf {
        if let Some(dirs) = directories::ProjectDirs::from("com", "triage", "triage") {
            dirs.config_dir().join("config.toml")
        } else {
            PathBuf::from("~/.triage/config.toml")
        }
    }

    /// Where saved prompts live unless `[storage] prompts_dir` says otherwise
    pub fn prompts_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.prompts_dir {
            return dir.clone();
        }
        match directories::ProjectDirs::from("com", "triage", "triage") {
            Some(dirs) => dirs.data_dir().join("prompts"),
            None => PathBuf::from("prompts"),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema.0
    }

    /// `https://<domain>/api/v2`, or the explicit override
    pub fn helpdesk_base_url(&self) -> Option<String> {
        if let Some(url) = &self.helpdesk.base_url {
            return Some(url.trim_end_matches('/').to_string());
        }
        let domain = self
            .helpdesk
            .domain
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        if domain.is_empty() {
            None
        } else {
            Some(format!("https://{}/api/v2", domain))
        }
    }

    pub fn validate_for_fetch(&self) -> anyhow::Result<()> {
        if self.helpdesk_base_url().is_none() {
            bail!("Helpdesk domain is not set (see [helpdesk] in {})", Self::config_path().display());
        }
        if self.helpdesk.api_key.trim().is_empty() {
            bail!("Helpdesk API key is not set (use --helpdesk-key or TRIAGE_HELPDESK_API_KEY)");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    pub fn validate_for_analyze(&self) -> anyhow::Result<()> {
        if self.ai.api_key.trim().is_empty() {
            bail!("AI API key is not set (use --ai-key or TRIAGE_AI_API_KEY)");
        }
        if self.ai.model.trim().is_empty() {
            bail!("No model selected (use --model or TRIAGE_MODEL)");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        Ok(())
    }
}
