pub mod analyze;
pub mod departments;
pub mod fetch;
pub mod fields;
pub mod init;
pub mod models;
pub mod prompts;
pub mod report;
pub mod serve;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use triage_ai::{DEFAULT_BASE_URL, GeminiClient, GeminiSettings};
use triage_config::Config;
use triage_core::retry::Throttle;
use triage_core::{ReportAssembler, TicketRecord};
use triage_engine::{JobType, Orchestrator, RunControl};
use triage_sources::{HelpdeskClient, HelpdeskSettings};
use triage_storage::PromptLibrary;
use triage_tokens::{Pricing, TokenEstimator};

use crate::cli::{Overrides, PromptArgs};

const HELPDESK_TIMEOUT: Duration = Duration::from_secs(30);
const AI_TIMEOUT: Duration = Duration::from_secs(120);

pub fn apply_overrides(config: &mut Config, overrides: &Overrides) {
    if let Some(domain) = &overrides.domain {
        config.helpdesk.domain = domain.clone();
    }
    if let Some(key) = &overrides.helpdesk_key {
        config.helpdesk.api_key = key.clone();
    }
    if let Some(key) = &overrides.ai_key {
        config.ai.api_key = key.clone();
    }
    if let Some(model) = &overrides.model {
        config.ai.model = model.clone();
    }
}

pub fn helpdesk_client(config: &Config) -> Result<HelpdeskClient> {
    config.validate_for_fetch()?;
    let base_url = config
        .helpdesk_base_url()
        .context("Helpdesk domain is not set")?;

    let throttle = Throttle::new(
        Duration::from_millis(config.retry.fetch_delay_ms),
        Duration::from_millis(config.retry.rate_limit_delay_increment_ms),
    );
    let settings = HelpdeskSettings {
        base_url,
        api_key: config.helpdesk.api_key.clone(),
        max_attempts: config.retry.max_attempts,
        rate_limit_cooldown: Duration::from_millis(config.retry.rate_limit_cooldown_ms),
        timeout: HELPDESK_TIMEOUT,
    };
    Ok(HelpdeskClient::new(settings, throttle)?)
}

pub fn gemini_client(config: &Config) -> Result<GeminiClient> {
    let settings = GeminiSettings {
        base_url: config
            .ai
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        api_key: config.ai.api_key.clone(),
        model: config.ai.model.clone(),
        max_attempts: config.retry.max_attempts,
        initial_backoff: Duration::from_millis(config.retry.ai_initial_backoff_ms),
        timeout: AI_TIMEOUT,
    };
    Ok(GeminiClient::new(settings)?)
}

/// Orchestrator with every config-driven piece set; clients are added by the caller
pub fn orchestrator(config: &Config, control: RunControl) -> Orchestrator {
    let mut orchestrator = Orchestrator::new(control)
        .with_schema(config.schema().clone())
        .with_pii(config.pii)
        .with_assembler(ReportAssembler::new(config.report.section_labels.clone()))
        .with_pricing(pricing(config));

    match TokenEstimator::new() {
        Ok(estimator) => orchestrator = orchestrator.with_estimator(estimator),
        Err(e) => warn!("local token estimator unavailable: {}", e),
    }
    orchestrator
}

pub fn pricing(config: &Config) -> Pricing {
    Pricing {
        input_per_million: config.pricing.input_per_million,
        output_per_million: config.pricing.output_per_million,
    }
}

/// Run control that Ctrl-C cancels
pub fn interruptible() -> RunControl {
    let control = RunControl::new();
    let handle = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling...");
            handle.cancel();
        }
    });
    control
}

pub fn write_output(dir: &Path, name: &str, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✓ Wrote {}", path.display());
    Ok(path)
}

pub fn read_tickets(path: &Path) -> Result<Vec<TicketRecord>> {
    let text = std::fs::read_to_string(path).with_context(|| {
        format!("Failed to read {} (run `triage fetch` first)", path.display())
    })?;
    let records = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a tickets file", path.display()))?;
    Ok(records)
}

pub async fn prompt_library(config: &Config) -> Result<PromptLibrary> {
    Ok(PromptLibrary::open(config.prompts_dir()).await?)
}

/// Prompt text plus the job type a saved prompt asks for
pub async fn resolve_prompt(config: &Config, args: &PromptArgs) -> Result<(String, Option<JobType>)> {
    if let Some(text) = &args.prompt {
        return Ok((text.clone(), None));
    }
    let name = args
        .prompt_file
        .as_deref()
        .context("Pass --prompt or --prompt-file")?;

    let library = prompt_library(config).await?;
    let document = library
        .load_document(&with_json_extension(name))
        .await
        .with_context(|| format!("Failed to load prompt '{}'", name))?;

    let job = match document.job_type.as_deref() {
        Some("bulk") => Some(JobType::Bulk),
        Some("per_ticket") | Some("per-ticket") => Some(JobType::PerTicket),
        Some(other) => {
            warn!(prompt = name, "unknown job type '{}', ignoring", other);
            None
        }
        None => None,
    };
    Ok((document.prompt, job))
}

pub fn with_json_extension(name: &str) -> String {
    if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{}.json", name)
    }
}
