use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;
use triage_ai::{GeminiClient, UploadedFile};
use triage_config::Config;
use triage_core::AssembledReport;
use triage_core::export::analyses_to_csv;
use triage_engine::{
    AnalysisJob, AnalyzeOutcome, EngineError, EstimateSource, JobType, RunControl, Session,
};
use triage_tokens::UsageMeter;

use crate::cli::{JobArg, PromptArgs};

use super::{
    gemini_client, interruptible, orchestrator, pricing, read_tickets, resolve_prompt,
    write_output,
};

pub async fn handle(
    config: &Config,
    prompt: &PromptArgs,
    tickets: &Path,
    job: Option<JobArg>,
    attach: Option<&Path>,
    out: &Path,
) -> Result<()> {
    config.validate_for_analyze()?;
    let (prompt, saved_job) = resolve_prompt(config, prompt).await?;
    let job_type = job.map(JobType::from).or(saved_job).unwrap_or_default();
    let records = read_tickets(tickets)?;

    let client = Arc::new(gemini_client(config)?);
    let control = interruptible();
    let attachment = match (attach, job_type) {
        (Some(path), JobType::Bulk) => Some(upload(&client, path, &control).await?),
        (Some(_), JobType::PerTicket) => {
            warn!("--attach is only sent with bulk jobs, ignoring");
            None
        }
        (None, _) => None,
    };

    let orchestrator = orchestrator(config, control).with_generator(client);
    let mut session = Session::with_tickets(records);
    let job = AnalysisJob {
        job_type,
        prompt,
        attachment,
    };

    println!("Analyzing {} ticket(s)...", session.tickets.len());
    let result = orchestrator.analyze(&mut session, &job).await;

    match result {
        Ok(AnalyzeOutcome::Classified(analyses)) => {
            write_output(out, "results.csv", &analyses_to_csv(&analyses))?;
            let failed = analyses.iter().filter(|a| a.is_failed()).count();
            println!("✓ Classified {} ticket(s)", analyses.len() - failed);
            if failed > 0 {
                println!("  {} failed, see the error column in results.csv", failed);
            }
        }
        Ok(AnalyzeOutcome::Report(report)) => write_report(out, &report)?,
        Ok(AnalyzeOutcome::ManualFallback { reason, prompt }) => {
            if !session.analyses.is_empty() {
                write_output(out, "results.csv", &analyses_to_csv(&session.analyses))?;
            }
            write_output(out, "manual_prompt.txt", &prompt)?;
            println!("! Analysis stopped: {}", reason);
            println!("  Run manual_prompt.txt by hand, save the answer, then run `triage report <file>`");
        }
        Err(EngineError::Cancelled) => {
            if !session.analyses.is_empty() {
                write_output(out, "results.csv", &analyses_to_csv(&session.analyses))?;
            }
            println!("Analysis cancelled after {} ticket(s)", session.analyses.len());
            session.reset();
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    print_usage(config, &session.usage);
    Ok(())
}

pub async fn estimate(config: &Config, prompt: &PromptArgs, tickets: &Path) -> Result<()> {
    let (prompt, _) = resolve_prompt(config, prompt).await?;
    let session = Session::with_tickets(read_tickets(tickets)?);

    let mut orchestrator = orchestrator(config, interruptible());
    if !config.ai.api_key.trim().is_empty() {
        orchestrator = orchestrator.with_generator(Arc::new(gemini_client(config)?));
    }

    let estimate = orchestrator.estimate(&session, &prompt).await?;
    let how = match estimate.source {
        EstimateSource::Counted => "counted by the model provider",
        EstimateSource::Local => "local estimate",
    };

    println!("Bulk prompt over {} ticket(s):", session.tickets.len());
    println!("  Input tokens: {} ({})", estimate.tokens, how);
    println!("  Estimated input cost: ${:.4}", estimate.input_cost);
    Ok(())
}

pub fn write_report(out: &Path, report: &AssembledReport) -> Result<()> {
    write_output(out, "report.md", &report.markdown_report)?;
    for section in &report.csvs {
        write_output(out, &section.filename, &section.content)?;
    }
    println!("✓ Report written with {} CSV section(s)", report.csvs.len());
    Ok(())
}

async fn upload(
    client: &GeminiClient,
    path: &Path,
    control: &RunControl,
) -> Result<UploadedFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    let file = client
        .upload_file(&name, mime_type(path), bytes, control.token())
        .await?;
    println!("✓ Uploaded {}", name);
    Ok(file)
}

fn mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("md") => "text/markdown",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn print_usage(config: &Config, usage: &UsageMeter) {
    if usage.calls == 0 {
        return;
    }
    println!(
        "  {} call(s), {} prompt + {} output tokens, about ${:.4}",
        usage.calls,
        usage.prompt_tokens,
        usage.output_tokens,
        usage.estimated_cost(&pricing(config))
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use triage_core::CsvSection;

    #[test]
    fn test_mime_type() {
        assert_eq!(mime_type(Path::new("a/b.CSV")), "text/csv");
        assert_eq!(mime_type(Path::new("notes")), "application/octet-stream");
    }

    #[test]
    fn test_write_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let report = AssembledReport {
            markdown_report: "# Report".to_string(),
            csvs: vec![CsvSection {
                filename: "category_summary.csv".to_string(),
                content: "category,count".to_string(),
            }],
        };

        write_report(dir.path(), &report).unwrap();

        let md = std::fs::read_to_string(dir.path().join("report.md")).unwrap();
        assert_eq!(md, "# Report");
        assert!(dir.path().join("category_summary.csv").exists());
    }
}
