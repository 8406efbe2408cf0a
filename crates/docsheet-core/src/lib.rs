use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub mod backend;
pub mod config_file;
pub mod normalize;

// Re-export for convenience
pub use backend::{BackendError, OcrEngine, OcrError, PageRasterizer, PdfBackend};
pub use normalize::{Normalize, clean_text, normalize_records};

/// The kind of content a document holds, decided from its extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Bibtex,
    /// `.ris`, `.nbib` and `.enw` line-tagged exports.
    RisFamily,
    Xml,
    Pdf,
    Unsupported,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bibtex => "bibtex",
            Self::RisFamily => "ris_family",
            Self::Xml => "xml",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell-level value: either one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    /// Render the value as a single spreadsheet cell. Lists are joined with `", "`.
    pub fn to_cell(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join(", "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }
}

/// Canonical citation fields shared by every citation dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    Authors,
    Title,
    Journal,
    Year,
    Doi,
    Volume,
    Issue,
    Pages,
    Url,
    Abstract,
}

impl CanonicalField {
    /// Column order used when a record is flattened.
    pub const ALL: [CanonicalField; 10] = [
        Self::Authors,
        Self::Title,
        Self::Journal,
        Self::Year,
        Self::Doi,
        Self::Volume,
        Self::Issue,
        Self::Pages,
        Self::Url,
        Self::Abstract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authors => "authors",
            Self::Title => "title",
            Self::Journal => "journal",
            Self::Year => "year",
            Self::Doi => "doi",
            Self::Volume => "volume",
            Self::Issue => "issue",
            Self::Pages => "pages",
            Self::Url => "url",
            Self::Abstract => "abstract",
        }
    }
}

/// One bibliographic citation.
///
/// Known fields are typed; anything outside the canonical vocabulary is kept
/// verbatim in `extra` under its original key, in the order it was first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub authors: Vec<String>,
    pub title: Option<String>,
    pub journal: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub url: Option<String>,
    pub abstract_text: Option<String>,
    pub extra: IndexMap<String, String>,
}

impl EntryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field has been set yet.
    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
            && CanonicalField::ALL
                .iter()
                .filter(|f| **f != CanonicalField::Authors)
                .all(|f| self.get(*f).is_none())
            && self.extra.is_empty()
    }

    fn slot_mut(&mut self, field: CanonicalField) -> Option<&mut Option<String>> {
        match field {
            CanonicalField::Authors => None,
            CanonicalField::Title => Some(&mut self.title),
            CanonicalField::Journal => Some(&mut self.journal),
            CanonicalField::Year => Some(&mut self.year),
            CanonicalField::Doi => Some(&mut self.doi),
            CanonicalField::Volume => Some(&mut self.volume),
            CanonicalField::Issue => Some(&mut self.issue),
            CanonicalField::Pages => Some(&mut self.pages),
            CanonicalField::Url => Some(&mut self.url),
            CanonicalField::Abstract => Some(&mut self.abstract_text),
        }
    }

    /// Value of a single-string canonical field. `Authors` always returns `None`;
    /// use [`EntryRecord::authors`] directly.
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        let slot = match field {
            CanonicalField::Authors => return None,
            CanonicalField::Title => &self.title,
            CanonicalField::Journal => &self.journal,
            CanonicalField::Year => &self.year,
            CanonicalField::Doi => &self.doi,
            CanonicalField::Volume => &self.volume,
            CanonicalField::Issue => &self.issue,
            CanonicalField::Pages => &self.pages,
            CanonicalField::Url => &self.url,
            CanonicalField::Abstract => &self.abstract_text,
        };
        slot.as_deref()
    }

    /// Merge a value into a canonical field. Authors accumulate, every other
    /// field keeps the most recent value.
    pub fn set(&mut self, field: CanonicalField, value: impl Into<String>) {
        let value = value.into();
        match self.slot_mut(field) {
            Some(slot) => *slot = Some(value),
            None => self.authors.push(value),
        }
    }

    /// Store a passthrough field under its original key.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.extra.insert(key.into(), value.into());
    }

    /// Flatten into ordered `(column, value)` pairs, skipping unset fields.
    pub fn fields(&self) -> Vec<(Cow<'_, str>, FieldValue)> {
        let mut out = Vec::new();
        for field in CanonicalField::ALL {
            if field == CanonicalField::Authors {
                if !self.authors.is_empty() {
                    out.push((
                        Cow::Borrowed(field.as_str()),
                        FieldValue::List(self.authors.clone()),
                    ));
                }
                continue;
            }
            if let Some(v) = self.get(field) {
                out.push((Cow::Borrowed(field.as_str()), FieldValue::Text(v.to_string())));
            }
        }
        for (k, v) in &self.extra {
            out.push((Cow::Borrowed(k.as_str()), FieldValue::Text(v.clone())));
        }
        out
    }
}

/// Resume section names recognised by the segmenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionName {
    Contact,
    Summary,
    Experience,
    Skills,
    Education,
    Projects,
    Certifications,
    Awards,
    Languages,
    Volunteer,
}

impl SectionName {
    pub const ALL: [SectionName; 10] = [
        Self::Contact,
        Self::Summary,
        Self::Experience,
        Self::Skills,
        Self::Education,
        Self::Projects,
        Self::Certifications,
        Self::Awards,
        Self::Languages,
        Self::Volunteer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Summary => "summary",
            Self::Experience => "experience",
            Self::Skills => "skills",
            Self::Education => "education",
            Self::Projects => "projects",
            Self::Certifications => "certifications",
            Self::Awards => "awards",
            Self::Languages => "languages",
            Self::Volunteer => "volunteer",
        }
    }
}

/// A formatted resume section: joined text, or a list of entries/tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSection {
    pub name: SectionName,
    pub content: FieldValue,
}

/// One row-producing unit of extracted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record {
    Entry(EntryRecord),
    Section(ResumeSection),
    /// Unstructured text with no recognisable structure.
    Text { text: String },
}

impl Record {
    /// Flatten into ordered `(column, value)` pairs.
    pub fn fields(&self) -> Vec<(Cow<'_, str>, FieldValue)> {
        match self {
            Self::Entry(entry) => entry.fields(),
            Self::Section(section) => vec![
                (
                    Cow::Borrowed("section"),
                    FieldValue::Text(section.name.as_str().to_string()),
                ),
                (Cow::Borrowed("content"), section.content.clone()),
            ],
            Self::Text { text } => vec![(Cow::Borrowed("text"), FieldValue::Text(text.clone()))],
        }
    }

    pub fn is_section(&self) -> bool {
        matches!(self, Self::Section(_))
    }
}

/// Which PDF stage produced the text, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfStage {
    Native,
    Ocr,
    None,
}

/// Summary of a single document's extraction, handed to the caller beside the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub kind: DocumentKind,
    /// Only set for PDF input.
    pub pdf_stage: Option<PdfStage>,
    pub record_count: usize,
}

/// Result of extracting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub records: Vec<Record>,
    pub report: ExtractionReport,
}

/// Settings for the OCR fallback stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    /// When false, scanned PDFs yield no text instead of running OCR.
    pub enabled: bool,
    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    pub language: String,
    /// Rasterization resolution for page 1.
    pub dpi: u32,
    pub timeout: Duration,
    pub tesseract_path: PathBuf,
    /// Directory holding per-call scratch directories. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

pub const DEFAULT_OCR_LANGUAGE: &str = "eng";
pub const DEFAULT_OCR_DPI: u32 = 300;
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(60);

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            language: DEFAULT_OCR_LANGUAGE.to_string(),
            dpi: DEFAULT_OCR_DPI,
            timeout: DEFAULT_OCR_TIMEOUT,
            tesseract_path: PathBuf::from("tesseract"),
            temp_dir: None,
        }
    }
}
