use anyhow::{Result, bail};
use triage_ai::ContentGenerator;
use triage_config::Config;

use super::{gemini_client, interruptible};

pub async fn handle(config: &Config) -> Result<()> {
    if config.ai.api_key.trim().is_empty() {
        bail!("AI API key is not set (use --ai-key or TRIAGE_AI_API_KEY)");
    }
    let client = gemini_client(config)?;
    let control = interruptible();

    let models: Vec<_> = client
        .list_models(control.token())
        .await?
        .into_iter()
        .filter(|m| m.supports_generation())
        .collect();

    if models.is_empty() {
        println!("No models available for content generation.");
        return Ok(());
    }

    println!("Models:");
    for model in models {
        let id = model.name.strip_prefix("models/").unwrap_or(&model.name);
        let marker = if id == client.model() { "*" } else { " " };
        let limit = model
            .input_token_limit
            .map(|n| format!("{} input tokens", n))
            .unwrap_or_default();
        println!("{} {}  {}  {}", marker, id, model.display_name, limit);
    }

    Ok(())
}
