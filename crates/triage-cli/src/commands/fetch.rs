use anyhow::{Result, bail};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use triage_config::Config;
use triage_core::export::records_to_json;
use triage_core::millis;
use triage_engine::{EngineError, Session};
use triage_sources::{load_table, resolve_ticket_ids};

use super::{helpdesk_client, interruptible, orchestrator, write_output};

pub async fn handle(config: &Config, input: &Path, column: &str, out: &Path) -> Result<()> {
    let table = load_table(input)?;
    let ids = resolve_ticket_ids(&table, column)?;
    if ids.is_empty() {
        bail!("No ticket IDs found in column '{}' of {}", column, input.display());
    }

    let client = Arc::new(helpdesk_client(config)?);
    let throttle = client.throttle().clone();
    let orchestrator = orchestrator(config, interruptible()).with_source(client);

    println!("Fetching {} ticket(s)...", ids.len());
    let mut session = Session::new();
    let result = orchestrator.fetch(&mut session, &ids).await;

    if !session.tickets.is_empty() {
        write_output(out, "tickets.json", &records_to_json(&session.tickets)?)?;
    }
    if !session.fetch_failures.is_empty() {
        let failures = serde_json::to_string_pretty(&session.fetch_failures)?;
        write_output(out, "fetch_failures.json", &failures)?;
    }
    persist_fetch_delay(config, throttle.current())?;

    match result {
        Ok(summary) => {
            println!("✓ Fetched {} ticket(s)", summary.fetched);
            if summary.failed > 0 {
                println!("  {} failed, see fetch_failures.json", summary.failed);
            }
            Ok(())
        }
        Err(EngineError::Cancelled) => {
            println!("Fetch cancelled after {} ticket(s)", session.tickets.len());
            session.reset();
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Keep a delay raised by rate limiting for the next run
fn persist_fetch_delay(config: &Config, delay: Duration) -> Result<()> {
    let delay_ms = millis(delay);
    if delay_ms == config.retry.fetch_delay_ms {
        return Ok(());
    }

    // Reload so command-line credentials are not written to disk
    let mut on_disk = Config::load()?;
    on_disk.retry.fetch_delay_ms = delay_ms;
    on_disk.save()?;

    info!(delay_ms, "fetch delay raised after rate limiting");
    println!("  Fetch delay is now {} ms", delay_ms);
    Ok(())
}
