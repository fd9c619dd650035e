use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use triage_config::Config;
use triage_core::{Schema, Selection, SelectionTree};
use triage_sources::TicketSource;

use super::{helpdesk_client, interruptible};

#[derive(Serialize)]
struct SchemaSection {
    schema: Schema,
}

pub async fn handle(config: &Config, ticket_id: &str, form_fields: bool) -> Result<()> {
    let client = helpdesk_client(config)?;
    let control = interruptible();

    let bundle = client.fetch_ticket(ticket_id, control.token()).await?;

    let section = SchemaSection {
        schema: Schema {
            ticket: SelectionTree::from_sample(&bundle.ticket),
            conversation: merged_sample(&bundle.conversations),
            requester: bundle
                .requester
                .as_ref()
                .and_then(Value::as_object)
                .map(SelectionTree::from_sample)
                .unwrap_or_default(),
        },
    };

    println!("# Every field seen on ticket {}; set unwanted ones to false", ticket_id);
    println!("{}", toml::to_string_pretty(&section)?);

    if form_fields {
        let fields = client.form_fields(control.token()).await?;
        println!("# Ticket form fields:");
        for field in &fields {
            let name = field.get("name").and_then(Value::as_str).unwrap_or("?");
            let label = field.get("label").and_then(Value::as_str).unwrap_or("");
            let kind = field.get("field_type").and_then(Value::as_str).unwrap_or("");
            println!("#   {:<32} {:<24} {}", name, kind, label);
        }
    }

    Ok(())
}

/// One tree covering the fields of every conversation entry
fn merged_sample(entries: &[Value]) -> SelectionTree {
    let mut wrapper = Map::new();
    wrapper.insert("entries".to_string(), Value::Array(entries.to_vec()));
    match SelectionTree::from_sample(&wrapper).get("entries") {
        Some(Selection::Nested(tree)) => tree.clone(),
        _ => SelectionTree::new(),
    }
}
