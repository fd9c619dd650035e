use anyhow::{Context, Result, bail};
use std::path::Path;
use triage_config::Config;
use triage_storage::PromptDocument;

use crate::cli::JobArg;

use super::{prompt_library, with_json_extension};

pub async fn list(config: &Config) -> Result<()> {
    let library = prompt_library(config).await?;
    let names = library.list().await?;

    if names.is_empty() {
        println!("No saved prompts in {}", library.root().display());
        return Ok(());
    }

    println!("Prompts:");
    for name in names {
        match library.load_document(&name).await {
            Ok(doc) => {
                let job = doc.job_type.as_deref().unwrap_or("-");
                println!("  {:<32} {:<12} {}", name, job, doc.title);
            }
            Err(_) => println!("  {:<32} (not a prompt document)", name),
        }
    }

    Ok(())
}

pub async fn show(config: &Config, name: &str) -> Result<()> {
    let library = prompt_library(config).await?;
    let doc = library.load(&with_json_extension(name)).await?;
    println!("{}", serde_json::to_string_pretty(&doc)?);
    Ok(())
}

pub async fn save(
    config: &Config,
    name: &str,
    text: Option<String>,
    from: Option<&Path>,
    title: Option<String>,
    job: Option<JobArg>,
) -> Result<()> {
    let prompt = match (text, from) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        (None, None) => bail!("Pass --text or --from"),
    };
    if prompt.trim().is_empty() {
        bail!("Prompt is empty");
    }

    let filename = with_json_extension(name);
    let document = PromptDocument {
        title: title.unwrap_or_else(|| filename.trim_end_matches(".json").to_string()),
        job_type: job.map(|j| j.as_str().to_string()),
        prompt,
    };

    let library = prompt_library(config).await?;
    let stored = library
        .save(&filename, &serde_json::to_value(&document)?)
        .await?;

    println!("✓ Saved prompt: {}", stored);
    Ok(())
}

pub async fn delete(config: &Config, name: &str) -> Result<()> {
    let library = prompt_library(config).await?;
    library.delete(&with_json_extension(name)).await?;
    println!("✓ Deleted prompt: {}", name);
    Ok(())
}
