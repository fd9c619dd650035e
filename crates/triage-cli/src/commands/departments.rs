use anyhow::Result;
use serde_json::Value;
use triage_config::Config;

use super::{helpdesk_client, interruptible};

pub async fn handle(config: &Config) -> Result<()> {
    let client = helpdesk_client(config)?;
    let control = interruptible();

    let departments = client.list_departments(control.token()).await?;

    if departments.is_empty() {
        println!("No departments found.");
        return Ok(());
    }

    println!("Departments:");
    for department in &departments {
        let id = department.get("id").and_then(Value::as_u64).unwrap_or_default();
        let name = department.get("name").and_then(Value::as_str).unwrap_or("(unnamed)");
        println!("  {:>12}  {}", id, name);
    }
    println!("  {} total", departments.len());

    Ok(())
}
