//! Report assembler
//!
//! Splits a model's free-text answer into a Markdown report and the CSV
//! sections it embeds. There is no grammar here: the model may omit,
//! reorder or mangle sections, and every such case degrades to "fewer CSVs"
//! rather than an error.

use serde::{Deserialize, Serialize};

/// Section labels the bulk-report prompt asks the model to emit
pub const DEFAULT_SECTION_LABELS: [&str; 2] = ["CSV: Category Summary", "CSV: Ticket Breakdown"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvSection {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledReport {
    pub markdown_report: String,
    pub csvs: Vec<CsvSection>,
}

pub struct ReportAssembler {
    labels: Vec<String>,
}

impl ReportAssembler {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    pub fn assemble(&self, text: &str) -> AssembledReport {
        let body = from_first_heading(strip_outer_fence(text.trim()));

        // (line start, line end, label) for every marker that is present
        let mut markers: Vec<(usize, usize, &str)> = self
            .labels
            .iter()
            .filter_map(|label| {
                let at = body.find(label.as_str())?;
                let start = body[..at].rfind('\n').map(|i| i + 1).unwrap_or(0);
                let end = body[at..].find('\n').map(|i| at + i).unwrap_or(body.len());
                Some((start, end, label.as_str()))
            })
            .collect();
        markers.sort_by_key(|(start, _, _)| *start);

        let Some((first, _, _)) = markers.first() else {
            return AssembledReport {
                markdown_report: body.trim().to_string(),
                csvs: Vec::new(),
            };
        };

        let markdown_report = body[..*first].trim().to_string();
        let csvs = markers
            .iter()
            .enumerate()
            .map(|(i, (_, end, label))| {
                let stop = markers.get(i + 1).map(|(s, _, _)| *s).unwrap_or(body.len());
                let section = if *end < stop { &body[*end..stop] } else { "" };
                CsvSection {
                    filename: filename_for(label),
                    content: unwrap_csv_fence(section),
                }
            })
            .collect();

        AssembledReport {
            markdown_report,
            csvs,
        }
    }
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_SECTION_LABELS.iter().map(|s| s.to_string()).collect())
    }
}

/// `CSV: Category Summary` -> `category_summary.csv`
pub fn filename_for(label: &str) -> String {
    let name = label
        .split_once(':')
        .map(|(_, rest)| rest)
        .unwrap_or(label)
        .trim();
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_');
    if slug.is_empty() {
        "section.csv".to_string()
    } else {
        format!("{slug}.csv")
    }
}

fn strip_outer_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(rest) = rest.strip_suffix("```") else {
        return text;
    };
    // drop the language tag on the opening line
    match rest.find('\n') {
        Some(i) => rest[i + 1..].trim(),
        None => rest.trim(),
    }
}

fn from_first_heading(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            return &text[offset..];
        }
        offset += line.len();
    }
    text
}

fn unwrap_csv_fence(section: &str) -> String {
    let trimmed = section.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let after_open = &trimmed[open + 3..];
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(after_open.len());
    let body = &after_open[body_start..];
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "Sure! Here is the report you asked for.\n\
# Ticket Report\n\
\n\
Most tickets were about networking.\n\
\n\
### CSV: Category Summary\n\
```csv\n\
category,count\n\
Network,12\n\
Hardware,3\n\
```\n\
\n\
### CSV: Ticket Breakdown\n\
```csv\n\
ticket_id,category\n\
100,Network\n\
```\n";

    #[test]
    fn test_no_markers_returns_trimmed_text() {
        let text = "  # Weekly summary\n\nNothing unusual.\n\n";
        let report = ReportAssembler::default().assemble(text);

        assert!(report.csvs.is_empty());
        assert_eq!(report.markdown_report, text.trim());
    }

    #[test]
    fn test_both_sections_extracted() {
        let report = ReportAssembler::default().assemble(FULL);

        assert_eq!(
            report.markdown_report,
            "# Ticket Report\n\nMost tickets were about networking."
        );
        assert_eq!(report.csvs.len(), 2);
        assert_eq!(report.csvs[0].filename, "category_summary.csv");
        assert_eq!(report.csvs[0].content, "category,count\nNetwork,12\nHardware,3");
        assert_eq!(report.csvs[1].filename, "ticket_breakdown.csv");
        assert_eq!(report.csvs[1].content, "ticket_id,category\n100,Network");
        assert!(!report.markdown_report.contains("CSV:"));
    }

    #[test]
    fn test_wrapping_fence_is_stripped() {
        let wrapped = format!("```markdown\n{}\n```", "# Title\n\nBody");
        let report = ReportAssembler::default().assemble(&wrapped);

        assert_eq!(report.markdown_report, "# Title\n\nBody");
    }

    #[test]
    fn test_missing_marker_yields_single_section() {
        let text = "# Report\n\nText\n\nCSV: Ticket Breakdown\nticket_id,category\n7,Access\n";
        let report = ReportAssembler::default().assemble(text);

        assert_eq!(report.markdown_report, "# Report\n\nText");
        assert_eq!(report.csvs.len(), 1);
        assert_eq!(report.csvs[0].filename, "ticket_breakdown.csv");
        assert_eq!(report.csvs[0].content, "ticket_id,category\n7,Access");
    }

    #[test]
    fn test_reordered_markers() {
        let text = "# R\n\n## CSV: Ticket Breakdown\na,b\n\n## CSV: Category Summary\nc,d\n";
        let report = ReportAssembler::default().assemble(text);

        let names: Vec<&str> = report.csvs.iter().map(|c| c.filename.as_str()).collect();
        assert_eq!(names, vec!["ticket_breakdown.csv", "category_summary.csv"]);
        assert_eq!(report.csvs[0].content, "a,b");
        assert_eq!(report.csvs[1].content, "c,d");
    }

    #[test]
    fn test_filename_for_labels() {
        assert_eq!(filename_for("CSV: Category Summary"), "category_summary.csv");
        assert_eq!(filename_for("CSV:  SLA / Breaches "), "sla_breaches.csv");
        assert_eq!(filename_for("CSV:"), "section.csv");
    }
}
