use std::io::Write;
use std::path::{Path, PathBuf};

use docsheet_core::{DocumentKind, ExtractionResult, PdfStage};
use docsheet_ingest::{PipelineError, Processed};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// What happened to one input document.
#[derive(Debug)]
pub enum Outcome {
    Written(Processed),
    Previewed(ExtractionResult),
    /// Reported, non-fatal: the document held nothing to extract.
    NoData(PipelineError),
    Failed(PipelineError),
    /// The worker died before reporting.
    Crashed(String),
    /// Not started because the run was interrupted.
    Skipped,
}

impl Outcome {
    pub fn from_result<T>(result: Result<T, PipelineError>, ok: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => ok(value),
            Err(e) if !e.is_fatal() => Self::NoData(e),
            Err(e) => Self::Failed(e),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Crashed(_))
    }
}

#[derive(Debug)]
pub struct DocReport {
    pub input: PathBuf,
    pub outcome: Outcome,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn stage_label(stage: Option<PdfStage>) -> &'static str {
    match stage {
        Some(PdfStage::Native) => " via text layer",
        Some(PdfStage::Ocr) => " via OCR",
        _ => "",
    }
}

/// Print a one-line result for a document.
pub fn print_outcome(w: &mut dyn Write, report: &DocReport, color: ColorMode) -> std::io::Result<()> {
    let name = display_name(&report.input);
    match &report.outcome {
        Outcome::Written(processed) => {
            let detail = format!(
                "{} rows x {} columns{} -> {}",
                processed.sheet.rows.len(),
                processed.sheet.headers.len(),
                stage_label(processed.extraction.report.pdf_stage),
                processed.output.display()
            );
            if color.enabled() {
                writeln!(w, "{} {} ({})", "OK".green().bold(), name.bold(), detail)?;
            } else {
                writeln!(w, "OK {} ({})", name, detail)?;
            }
        }
        Outcome::Previewed(extraction) => {
            let detail = format!(
                "{} records, {}{}",
                extraction.report.record_count,
                extraction.report.kind,
                stage_label(extraction.report.pdf_stage)
            );
            if color.enabled() {
                writeln!(w, "{} {} ({})", "DRY RUN:".bold().cyan(), name.bold(), detail)?;
            } else {
                writeln!(w, "DRY RUN: {} ({})", name, detail)?;
            }
            print_records(w, extraction, color)?;
        }
        Outcome::NoData(e) => {
            if color.enabled() {
                writeln!(w, "{} {}: {}", "NO DATA".yellow().bold(), name.bold(), e)?;
            } else {
                writeln!(w, "NO DATA {}: {}", name, e)?;
            }
        }
        Outcome::Failed(e) => {
            if color.enabled() {
                writeln!(
                    w,
                    "{} {}: {} {}",
                    "FAILED".red().bold(),
                    name.bold(),
                    e,
                    format!("[{}]", e.reason()).dimmed()
                )?;
            } else {
                writeln!(w, "FAILED {}: {} [{}]", name, e, e.reason())?;
            }
        }
        Outcome::Crashed(message) => {
            if color.enabled() {
                writeln!(w, "{} {}: {}", "FAILED".red().bold(), name.bold(), message)?;
            } else {
                writeln!(w, "FAILED {}: {}", name, message)?;
            }
        }
        Outcome::Skipped => {
            if color.enabled() {
                writeln!(w, "{} {}", "SKIPPED".dimmed(), name)?;
            } else {
                writeln!(w, "SKIPPED {}", name)?;
            }
        }
    }
    Ok(())
}

/// Print normalized records as indented `field: value` blocks.
pub fn print_records(
    w: &mut dyn Write,
    extraction: &ExtractionResult,
    color: ColorMode,
) -> std::io::Result<()> {
    for (i, record) in extraction.records.iter().enumerate() {
        writeln!(w, "  [{}]", i + 1)?;
        for (key, value) in record.fields() {
            let cell = value.to_cell();
            let cell = cell.replace('\n', "\n      ");
            if color.enabled() {
                writeln!(w, "    {}: {}", key.cyan(), cell)?;
            } else {
                writeln!(w, "    {}: {}", key, cell)?;
            }
        }
    }
    writeln!(w)?;
    Ok(())
}

/// Print the kind assigned to each path.
pub fn print_classification(
    w: &mut dyn Write,
    path: &Path,
    kind: DocumentKind,
    color: ColorMode,
) -> std::io::Result<()> {
    let label = kind.as_str();
    if !color.enabled() {
        return writeln!(w, "{:<12} {}", label, path.display());
    }
    if kind == DocumentKind::Unsupported {
        writeln!(w, "{:<12} {}", label.red(), path.display())
    } else {
        writeln!(w, "{:<12} {}", label.green(), path.display())
    }
}

/// Totals across a batch.
pub fn print_summary(w: &mut dyn Write, reports: &[DocReport], color: ColorMode) -> std::io::Result<()> {
    let mut converted = 0;
    let mut no_data = 0;
    let mut failed = 0;
    let mut skipped = 0;
    for report in reports {
        match report.outcome {
            Outcome::Written(_) | Outcome::Previewed(_) => converted += 1,
            Outcome::NoData(_) => no_data += 1,
            Outcome::Failed(_) | Outcome::Crashed(_) => failed += 1,
            Outcome::Skipped => skipped += 1,
        }
    }

    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", "SUMMARY".bold())?;
        writeln!(w, "  Converted: {}", converted.to_string().green())?;
        writeln!(w, "  No data:   {}", no_data.to_string().yellow())?;
        writeln!(w, "  Failed:    {}", failed.to_string().red())?;
    } else {
        writeln!(w, "SUMMARY")?;
        writeln!(w, "  Converted: {}", converted)?;
        writeln!(w, "  No data:   {}", no_data)?;
        writeln!(w, "  Failed:    {}", failed)?;
    }
    if skipped > 0 {
        writeln!(w, "  Skipped:   {}", skipped)?;
    }
    Ok(())
}
