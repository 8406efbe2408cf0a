use std::path::Path;

use thiserror::Error;

pub mod bibtex;
pub mod ris;
pub mod xml;

pub use bibtex::parse_bibtex;
pub use ris::parse_ris_family;
pub use xml::parse_xml;

// Re-export domain types for convenience
pub use docsheet_core::EntryRecord;

#[derive(Error, Debug)]
pub enum CitationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed {format} document: {reason}")]
    MalformedDocument {
        format: &'static str,
        reason: String,
    },
}

/// Read a citation export as text. Non-UTF-8 bytes (Latin-1 exports are
/// common) are replaced rather than rejected.
fn read_lossy(path: &Path) -> Result<String, CitationError> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

/// Parse a `.ris`, `.nbib` or `.enw` file.
pub fn extract_entries_from_ris(path: &Path) -> Result<Vec<EntryRecord>, CitationError> {
    Ok(parse_ris_family(&read_lossy(path)?))
}

/// Parse a `.bib` file.
pub fn extract_entries_from_bib(path: &Path) -> Result<Vec<EntryRecord>, CitationError> {
    parse_bibtex(&read_lossy(path)?)
}

/// Parse an `.xml` citation export.
pub fn extract_entries_from_xml(path: &Path) -> Result<Vec<EntryRecord>, CitationError> {
    parse_xml(&read_lossy(path)?)
}
