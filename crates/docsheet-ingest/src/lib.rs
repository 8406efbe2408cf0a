use std::path::PathBuf;

use thiserror::Error;

use docsheet_citations::CitationError;
use docsheet_reporting::ExportError;

pub mod classify;
pub mod pipeline;

pub use classify::{classify, classify_supported};
pub use pipeline::{Pipeline, PipelineStage, Processed};
// Re-export domain types for convenience
pub use docsheet_core::{DocumentKind, ExtractionReport, ExtractionResult, PdfStage, Record};
pub use docsheet_reporting::{ExportFormat, Sheet};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unsupported file type '{0}' (expected .bib, .ris, .nbib, .enw, .xml or .pdf)")]
    UnsupportedFormat(String),
    #[error("{0}")]
    MalformedDocument(CitationError),
    #[error("no text could be extracted from {}", .path.display())]
    NoTextExtracted { path: PathBuf },
    #[error("no records were extracted")]
    EmptyExtraction,
    #[error("PDF support not compiled in (enable the `pdf` feature of docsheet-ingest)")]
    NoPdfSupport,
    #[error("export failed: {0}")]
    Export(ExportError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Short machine-friendly tag for the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::MalformedDocument(_) => "malformed_document",
            Self::NoTextExtracted { .. } => "no_text_extracted",
            Self::EmptyExtraction => "empty_extraction",
            Self::NoPdfSupport => "no_pdf_support",
            Self::Export(_) => "export_failed",
            Self::Io(_) => "io",
        }
    }

    /// Stage the pipeline was in when it failed.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::UnsupportedFormat(_) => PipelineStage::Classify,
            Self::MalformedDocument(_) | Self::NoPdfSupport | Self::Io(_) => PipelineStage::Parse,
            Self::NoTextExtracted { .. } | Self::EmptyExtraction | Self::Export(_) => {
                PipelineStage::Export
            }
        }
    }

    /// `false` for "nothing found" outcomes that are reported rather than
    /// treated as failures.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NoTextExtracted { .. })
    }
}

impl From<CitationError> for PipelineError {
    fn from(err: CitationError) -> Self {
        match err {
            CitationError::Io(e) => Self::Io(e),
            other => Self::MalformedDocument(other),
        }
    }
}

impl From<ExportError> for PipelineError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::EmptyExtraction => Self::EmptyExtraction,
            other => Self::Export(other),
        }
    }
}
