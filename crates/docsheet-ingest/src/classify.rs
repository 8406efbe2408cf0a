use std::path::Path;

use docsheet_core::DocumentKind;

use crate::PipelineError;

/// Decide a document's kind from its extension alone (case-insensitive).
pub fn classify(path: &Path) -> DocumentKind {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "bib" => DocumentKind::Bibtex,
        "ris" | "nbib" | "enw" => DocumentKind::RisFamily,
        "xml" => DocumentKind::Xml,
        "pdf" => DocumentKind::Pdf,
        _ => DocumentKind::Unsupported,
    }
}

/// Like [`classify`], but an unsupported extension is an error.
pub fn classify_supported(path: &Path) -> Result<DocumentKind, PipelineError> {
    match classify(path) {
        DocumentKind::Unsupported => Err(PipelineError::UnsupportedFormat(extension_label(path))),
        kind => Ok(kind),
    }
}

/// `.ext` for messages, or the file name when there is no extension.
pub(crate) fn extension_label(path: &Path) -> String {
    match path.extension() {
        Some(ext) => format!(".{}", ext.to_string_lossy()),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}
