//! CSV and JSON exports of fetched tickets and classification results

use serde_json::Value;

use crate::{AnalysisOutcome, Result, TicketAnalysis, TicketRecord};

/// Per-ticket results as CSV.
///
/// Columns: `ticket_id`, `status`, every top-level classification key in
/// first-seen order, then `error`.
pub fn analyses_to_csv(analyses: &[TicketAnalysis]) -> String {
    let mut keys: Vec<String> = Vec::new();
    for analysis in analyses {
        if let AnalysisOutcome::Classified {
            classification: Value::Object(map),
        } = &analysis.outcome
        {
            for key in map.keys() {
                if !keys.contains(key) {
                    keys.push(key.clone());
                }
            }
        }
    }

    let mut header = vec!["ticket_id".to_string(), "status".to_string()];
    header.extend(keys.iter().cloned());
    header.push("error".to_string());

    let mut out = String::new();
    push_row(&mut out, header.iter().map(String::as_str));

    for analysis in analyses {
        let mut row: Vec<String> = vec![analysis.ticket_id.clone()];
        match &analysis.outcome {
            AnalysisOutcome::Classified { classification } => {
                row.push("classified".to_string());
                for key in &keys {
                    let cell = match classification {
                        Value::Object(map) => map.get(key).map(cell_text).unwrap_or_default(),
                        _ => String::new(),
                    };
                    row.push(cell);
                }
                row.push(String::new());
            }
            AnalysisOutcome::Failed { error } => {
                row.push("failed".to_string());
                row.extend(keys.iter().map(|_| String::new()));
                row.push(error.clone());
            }
        }
        push_row(&mut out, row.iter().map(String::as_str));
    }

    out
}

/// Fetched tickets as pretty-printed JSON
pub fn records_to_json(records: &[TicketRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    let line: Vec<String> = cells.map(escape_csv).collect();
    out.push_str(&line.join(","));
    out.push('\n');
}

/// Quote a field when it contains a delimiter, quote or line break
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
