//! PDF text acquisition: native text layer first, OCR of page 1 as the
//! fallback.

pub mod acquire;
pub mod ocr;

pub use acquire::{PdfText, Stage, TextAcquirer};
pub use ocr::TesseractCli;
