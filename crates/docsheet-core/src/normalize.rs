//! Shape-agnostic cleanup of parser artifacts.
//!
//! BibTeX brace-wrapping and quoted values leak into field values from
//! several parsers; this is the single place they are removed.

use crate::{EntryRecord, ExtractionResult, FieldValue, Record, ResumeSection};

/// Remove `{`, `}` and `"` and trim surrounding whitespace.
pub fn clean_text(s: &str) -> String {
    s.replace(['{', '}', '"'], "").trim().to_string()
}

/// Values that can have their string contents cleaned.
pub trait Normalize {
    fn normalize(self) -> Self;
}

impl Normalize for String {
    fn normalize(self) -> Self {
        clean_text(&self)
    }
}

impl Normalize for Option<String> {
    fn normalize(self) -> Self {
        self.map(Normalize::normalize)
    }
}

impl Normalize for FieldValue {
    fn normalize(self) -> Self {
        match self {
            FieldValue::Text(s) => FieldValue::Text(s.normalize()),
            FieldValue::List(items) => {
                FieldValue::List(items.into_iter().map(Normalize::normalize).collect())
            }
        }
    }
}

impl Normalize for EntryRecord {
    fn normalize(self) -> Self {
        EntryRecord {
            authors: self.authors.into_iter().map(Normalize::normalize).collect(),
            title: self.title.normalize(),
            journal: self.journal.normalize(),
            year: self.year.normalize(),
            doi: self.doi.normalize(),
            volume: self.volume.normalize(),
            issue: self.issue.normalize(),
            pages: self.pages.normalize(),
            url: self.url.normalize(),
            abstract_text: self.abstract_text.normalize(),
            // Keys are left alone; only values carry parser artifacts.
            extra: self
                .extra
                .into_iter()
                .map(|(k, v)| (k, v.normalize()))
                .collect(),
        }
    }
}

impl Normalize for ResumeSection {
    fn normalize(self) -> Self {
        ResumeSection {
            name: self.name,
            content: self.content.normalize(),
        }
    }
}

impl Normalize for Record {
    fn normalize(self) -> Self {
        match self {
            Record::Entry(e) => Record::Entry(e.normalize()),
            Record::Section(s) => Record::Section(s.normalize()),
            Record::Text { text } => Record::Text {
                text: text.normalize(),
            },
        }
    }
}

impl Normalize for ExtractionResult {
    fn normalize(self) -> Self {
        ExtractionResult {
            records: normalize_records(self.records),
            report: self.report,
        }
    }
}

/// Normalize every record in order.
pub fn normalize_records(records: Vec<Record>) -> Vec<Record> {
    records.into_iter().map(Normalize::normalize).collect()
}
