use std::path::Path;

use mupdf::{Colorspace, Document, ImageFormat, Matrix, TextPageFlags};

use docsheet_core::{BackendError, PageRasterizer, PdfBackend};

/// MuPDF-based implementation of [`PdfBackend`] and [`PageRasterizer`].
///
/// This crate is the sole AGPL island: it isolates the mupdf dependency
/// (which is AGPL-3.0) so that citation-only code paths do not transitively
/// depend on it.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfBackend;

impl MupdfBackend {
    pub fn new() -> Self {
        Self
    }
}

fn open_document(path: &Path) -> Result<Document, BackendError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| BackendError::OpenError("invalid path encoding".into()))?;
    Document::open(path_str).map_err(|e| BackendError::OpenError(e.to_string()))
}

impl PdfBackend for MupdfBackend {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        let document = open_document(path)?;

        let mut pages_text = Vec::new();

        for page_result in document
            .pages()
            .map_err(|e| BackendError::ExtractionError(e.to_string()))?
        {
            let page = page_result.map_err(|e| BackendError::ExtractionError(e.to_string()))?;
            let text_page = page
                .to_text_page(TextPageFlags::empty())
                .map_err(|e| BackendError::ExtractionError(e.to_string()))?;

            // Block/line iteration keeps one output line per text line
            let mut page_text = String::new();
            for block in text_page.blocks() {
                for line in block.lines() {
                    let line_text: String = line
                        .chars()
                        .map(|c| c.char().unwrap_or('\u{FFFD}'))
                        .collect();
                    page_text.push_str(&line_text);
                    page_text.push('\n');
                }
            }
            pages_text.push(page_text);
        }

        tracing::debug!(path = %path.display(), pages = pages_text.len(), "extracted text layer");
        Ok(pages_text.join("\n"))
    }
}

impl PageRasterizer for MupdfBackend {
    fn rasterize_first_page(&self, pdf: &Path, dpi: u32, dest: &Path) -> Result<(), BackendError> {
        let document = open_document(pdf)?;
        let page = document
            .load_page(0)
            .map_err(|e| BackendError::RasterizeError(e.to_string()))?;

        // PDF user space is 72 units per inch
        let scale = dpi as f32 / 72.0;
        let pixmap = page
            .to_pixmap(
                &Matrix::new_scale(scale, scale),
                &Colorspace::device_gray(),
                false,
                false,
            )
            .map_err(|e| BackendError::RasterizeError(e.to_string()))?;

        let dest_str = dest
            .to_str()
            .ok_or_else(|| BackendError::RasterizeError("invalid destination encoding".into()))?;
        pixmap
            .save_as(dest_str, ImageFormat::PNG)
            .map_err(|e| BackendError::RasterizeError(e.to_string()))?;

        tracing::debug!(pdf = %pdf.display(), dpi, dest = %dest.display(), "rasterized page 1");
        Ok(())
    }
}
