//! Ticket-ID tables: spreadsheets or CSV exports listing the tickets to pull

use std::path::Path;

use calamine::Reader;
use triage_core::{Error, Result};

/// A header row plus data rows, every cell as text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TicketTable {
    /// First row becomes the header
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        if rows.is_empty() {
            return Self::default();
        }
        let headers = rows.remove(0).into_iter().map(|h| h.trim().to_string()).collect();
        Self { headers, rows }
    }

    /// Index of a column, matched on the trimmed header, case-insensitively
    pub fn column(&self, name: &str) -> Option<usize> {
        let wanted = name.trim();
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(wanted))
    }
}

/// Load the first worksheet of a spreadsheet, or a CSV/TXT file
pub fn load_table(path: &Path) -> Result<TicketTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" => {
            let text = std::fs::read_to_string(path)?;
            Ok(parse_csv(&text))
        }
        _ => load_workbook(path),
    }
}

fn load_workbook(path: &Path) -> Result<TicketTable> {
    let mut workbook = calamine::open_workbook_auto(path)
        .map_err(|e| Error::Other(anyhow::anyhow!("Failed to open spreadsheet: {}", e)))?;

    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(TicketTable::default());
    };
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| Error::Other(anyhow::anyhow!("Failed to read sheet '{}': {}", sheet, e)))?;

    let rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    Ok(TicketTable::from_rows(rows))
}

/// Parse CSV text. Quoted fields may contain commas and doubled quotes but
/// not line breaks.
pub fn parse_csv(text: &str) -> TicketTable {
    let rows = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_csv_line)
        .collect();
    TicketTable::from_rows(rows)
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => quoted = false,
            ('"', false) if field.is_empty() => quoted = true,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Ticket IDs from one column: every non-digit is stripped and empty cells
/// are dropped. Order and duplicates are kept.
pub fn resolve_ticket_ids(table: &TicketTable, column: &str) -> Result<Vec<String>> {
    let index = table
        .column(column)
        .ok_or_else(|| Error::UnknownColumn(column.to_string()))?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| row.get(index))
        .map(|cell| cell.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|id| !id.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(ids: &[&str]) -> TicketTable {
        let mut rows = vec![vec!["Subject".to_string(), "Ticket ID".to_string()]];
        rows.extend(ids.iter().map(|id| vec!["x".to_string(), id.to_string()]));
        TicketTable::from_rows(rows)
    }

    #[test]
    fn test_resolve_strips_non_digits_and_drops_empty() {
        let ids = resolve_ticket_ids(&table(&["100", "ABC-200", ""]), "Ticket ID").unwrap();
        assert_eq!(ids, vec!["100", "200"]);
    }

    #[test]
    fn test_resolve_keeps_duplicates_in_order() {
        let ids = resolve_ticket_ids(&table(&["#42", "INC-7", "42", "n/a"]), "ticket id").unwrap();
        assert_eq!(ids, vec!["42", "7", "42"]);
    }

    #[test]
    fn test_unknown_column() {
        let err = resolve_ticket_ids(&table(&["1"]), "Ticket").unwrap_err();
        assert!(matches!(err, Error::UnknownColumn(ref c) if c == "Ticket"));
    }

    #[test]
    fn test_short_rows_are_skipped() {
        let mut t = table(&["5"]);
        t.rows.push(vec!["only subject".to_string()]);
        assert_eq!(resolve_ticket_ids(&t, "Ticket ID").unwrap(), vec!["5"]);
    }

    #[test]
    fn test_parse_csv_quotes() {
        let t = parse_csv("Ticket ID,Subject\n101,\"VPN, again\"\n\n102,\"say \"\"hi\"\"\"\n");

        assert_eq!(t.headers, vec!["Ticket ID", "Subject"]);
        assert_eq!(t.rows[0], vec!["101", "VPN, again"]);
        assert_eq!(t.rows[1], vec!["102", "say \"hi\""]);
    }

    #[test]
    fn test_load_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.CSV");
        std::fs::write(&path, "Ticket ID\nSR-300\n301\n").unwrap();

        let t = load_table(&path).unwrap();
        assert_eq!(resolve_ticket_ids(&t, "Ticket ID").unwrap(), vec!["300", "301"]);
    }
}
