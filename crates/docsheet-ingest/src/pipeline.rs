//! The extraction pipeline: classify, parse, segment (PDF only), normalize,
//! export. Every stage runs once; the first failure ends the run.

use std::path::{Path, PathBuf};

use docsheet_core::{
    DocumentKind, EntryRecord, ExtractionReport, ExtractionResult, OcrConfig, OcrEngine,
    PageRasterizer, PdfBackend, PdfStage, Record, normalize_records,
};
use docsheet_pdf::TextAcquirer;
use docsheet_reporting::{ExportFormat, Sheet, export_records};

use crate::PipelineError;
use crate::classify::classify_supported;

/// Pipeline states, in order. A failure in any of them is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Classify,
    Parse,
    Segment,
    Normalize,
    Export,
    Done,
}

/// Collaborators used for PDF input.
struct PdfTools {
    backend: Box<dyn PdfBackend>,
    rasterizer: Box<dyn PageRasterizer>,
    ocr: Box<dyn OcrEngine>,
}

/// Outcome of a full run that wrote a sheet.
#[derive(Debug, Clone)]
pub struct Processed {
    pub extraction: ExtractionResult,
    pub sheet: Sheet,
    pub output: PathBuf,
}

/// Runs documents through the pipeline. Holds no per-document state, so one
/// instance can serve concurrent calls.
pub struct Pipeline {
    pdf: Option<PdfTools>,
    ocr_config: OcrConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(OcrConfig::default())
    }
}

impl Pipeline {
    /// Pipeline with the default PDF collaborators (MuPDF and the Tesseract
    /// CLI) when the `pdf` feature is enabled.
    #[cfg(feature = "pdf")]
    pub fn new(ocr_config: OcrConfig) -> Self {
        let mupdf = docsheet_pdf_mupdf::MupdfBackend::new();
        let ocr = docsheet_pdf::TesseractCli::from_config(&ocr_config);
        Self::with_pdf_tools(Box::new(mupdf), Box::new(mupdf), Box::new(ocr), ocr_config)
    }

    #[cfg(not(feature = "pdf"))]
    pub fn new(ocr_config: OcrConfig) -> Self {
        Self {
            pdf: None,
            ocr_config,
        }
    }

    /// Pipeline with caller-supplied PDF collaborators.
    pub fn with_pdf_tools(
        backend: Box<dyn PdfBackend>,
        rasterizer: Box<dyn PageRasterizer>,
        ocr: Box<dyn OcrEngine>,
        ocr_config: OcrConfig,
    ) -> Self {
        Self {
            pdf: Some(PdfTools {
                backend,
                rasterizer,
                ocr,
            }),
            ocr_config,
        }
    }

    pub fn ocr_config(&self) -> &OcrConfig {
        &self.ocr_config
    }

    /// Classify, parse, segment and normalize `path`.
    ///
    /// A PDF with no text from either stage is not an error here: it comes
    /// back with no records and `pdf_stage == Some(PdfStage::None)`.
    pub fn extract(&self, path: &Path) -> Result<ExtractionResult, PipelineError> {
        tracing::debug!(path = %path.display(), stage = ?PipelineStage::Classify, "pipeline stage");
        let kind = classify_supported(path)?;

        tracing::debug!(path = %path.display(), stage = ?PipelineStage::Parse, kind = kind.as_str(), "pipeline stage");
        let (records, pdf_stage) = match kind {
            DocumentKind::Bibtex => (
                entries(docsheet_citations::extract_entries_from_bib(path)?),
                None,
            ),
            DocumentKind::RisFamily => (
                entries(docsheet_citations::extract_entries_from_ris(path)?),
                None,
            ),
            DocumentKind::Xml => (
                entries(docsheet_citations::extract_entries_from_xml(path)?),
                None,
            ),
            DocumentKind::Pdf => {
                let pdf = self.pdf.as_ref().ok_or(PipelineError::NoPdfSupport)?;
                let acquired = TextAcquirer::new(
                    pdf.backend.as_ref(),
                    pdf.rasterizer.as_ref(),
                    pdf.ocr.as_ref(),
                    &self.ocr_config,
                )
                .acquire(path);
                tracing::debug!(path = %path.display(), stage = ?PipelineStage::Segment, "pipeline stage");
                (structure_text(acquired.text), Some(acquired.stage))
            }
            DocumentKind::Unsupported => {
                return Err(PipelineError::UnsupportedFormat(
                    crate::classify::extension_label(path),
                ));
            }
        };

        tracing::debug!(path = %path.display(), stage = ?PipelineStage::Normalize, "pipeline stage");
        let records = normalize_records(records);

        let report = ExtractionReport {
            kind,
            pdf_stage,
            record_count: records.len(),
        };
        tracing::info!(
            path = %path.display(),
            kind = kind.as_str(),
            pdf_stage = ?pdf_stage,
            records = report.record_count,
            "extracted document"
        );
        Ok(ExtractionResult { records, report })
    }

    /// Run the whole pipeline and write the sheet to `dest`.
    ///
    /// Nothing is written unless at least one row reaches the exporter.
    pub fn process(
        &self,
        input: &Path,
        dest: &Path,
        format: ExportFormat,
    ) -> Result<Processed, PipelineError> {
        let extraction = self.extract(input)?;

        if extraction.report.pdf_stage == Some(PdfStage::None) {
            tracing::info!(path = %input.display(), "no text found in PDF");
            return Err(PipelineError::NoTextExtracted {
                path: input.to_path_buf(),
            });
        }

        tracing::debug!(path = %input.display(), stage = ?PipelineStage::Export, dest = %dest.display(), "pipeline stage");
        let sheet = export_records(&extraction.records, format, dest)?;

        tracing::debug!(path = %input.display(), stage = ?PipelineStage::Done, "pipeline stage");
        Ok(Processed {
            extraction,
            sheet,
            output: dest.to_path_buf(),
        })
    }
}

fn entries(records: Vec<EntryRecord>) -> Vec<Record> {
    records.into_iter().map(Record::Entry).collect()
}

/// Turn acquired PDF text into records: resume sections when headings are
/// found, otherwise the whole text as a single record.
fn structure_text(text: String) -> Vec<Record> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let sections = docsheet_resume::segment_resume(&text);
    if sections.is_empty() {
        return vec![Record::Text { text }];
    }
    sections.into_iter().map(Record::Section).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsheet_core::{FieldValue, SectionName};

    #[test]
    fn test_structure_text_sections() {
        let records = structure_text("Skills\nRust, Go\n".to_string());
        assert_eq!(records.len(), 1);
        match &records[0] {
            Record::Section(s) => {
                assert_eq!(s.name, SectionName::Skills);
                assert_eq!(s.content, FieldValue::List(vec!["Rust".into(), "Go".into()]));
            }
            other => panic!("expected a section, got {other:?}"),
        }
    }

    #[test]
    fn test_structure_text_plain() {
        let records = structure_text("An invoice\nTotal: 12".to_string());
        assert_eq!(
            records,
            vec![Record::Text {
                text: "An invoice\nTotal: 12".into()
            }]
        );
    }

    #[test]
    fn test_structure_text_blank() {
        assert!(structure_text(" \n\n".to_string()).is_empty());
    }
}
