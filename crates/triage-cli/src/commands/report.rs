use anyhow::{Context, Result};
use std::path::Path;
use triage_config::Config;
use triage_core::ReportAssembler;

use super::analyze::write_report;

pub fn handle(config: &Config, input: &Path, out: &Path) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let assembler = ReportAssembler::new(config.report.section_labels.clone());
    write_report(out, &assembler.assemble(&text))
}
