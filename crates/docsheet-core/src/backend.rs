use std::path::Path;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open PDF: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("failed to rasterize page: {0}")]
    RasterizeError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    Unavailable(String),
    #[error("failed to start OCR engine: {0}")]
    Spawn(String),
    #[error("OCR engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("OCR timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for PDF text-layer extraction backends.
///
/// Implementors provide the native extraction step only; the OCR fallback
/// decision lives in `docsheet_pdf::TextAcquirer`.
pub trait PdfBackend: Send + Sync {
    /// Extract the full embedded text of a PDF file.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;
}

/// Renders a single PDF page to an image file.
pub trait PageRasterizer: Send + Sync {
    /// Render page 1 of `pdf` at `dpi` into a PNG at `dest`.
    fn rasterize_first_page(&self, pdf: &Path, dpi: u32, dest: &Path) -> Result<(), BackendError>;
}

/// Optical character recognition over a single image.
///
/// Each call owns the whole engine lifecycle: whatever process or worker
/// it needs is started and torn down before `recognize` returns.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}
