use indexmap::{IndexMap, IndexSet};

use docsheet_core::{FieldValue, Record};

use crate::ExportError;

/// A single tabular sheet: header row plus string cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `row` under header `column`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column(column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

pub const SECTION_COLUMN: &str = "section";
pub const CONTENT_COLUMN: &str = "content";

/// Lay `records` out as a sheet.
///
/// Resume output (any section record present) uses the fixed
/// `section, content` schema with one row per list element. Everything else
/// gets the union of record keys as columns, in order of first appearance.
///
/// Fails with [`ExportError::EmptyExtraction`] when there is nothing to
/// write.
pub fn build_sheet(records: &[Record]) -> Result<Sheet, ExportError> {
    if records.is_empty() {
        return Err(ExportError::EmptyExtraction);
    }

    let sheet = if records.iter().any(Record::is_section) {
        section_sheet(records)
    } else {
        keyed_sheet(records)
    };

    if sheet.rows.is_empty() {
        return Err(ExportError::EmptyExtraction);
    }
    Ok(sheet)
}

fn section_sheet(records: &[Record]) -> Sheet {
    let mut rows = Vec::new();
    for record in records {
        match record {
            Record::Section(section) => {
                let label = section.name.as_str().to_string();
                match &section.content {
                    FieldValue::List(items) => {
                        rows.extend(items.iter().map(|item| vec![label.clone(), item.clone()]));
                    }
                    FieldValue::Text(text) => rows.push(vec![label, text.clone()]),
                }
            }
            other => {
                let content: Vec<String> =
                    other.fields().into_iter().map(|(_, v)| v.to_cell()).collect();
                rows.push(vec![String::new(), content.join("\n")]);
            }
        }
    }

    Sheet {
        headers: vec![SECTION_COLUMN.to_string(), CONTENT_COLUMN.to_string()],
        rows,
    }
}

fn keyed_sheet(records: &[Record]) -> Sheet {
    let keyed: Vec<IndexMap<String, String>> = records
        .iter()
        .map(|record| {
            record
                .fields()
                .into_iter()
                .map(|(k, v)| (k.into_owned(), v.to_cell()))
                .collect()
        })
        .collect();

    let headers: IndexSet<&str> = keyed
        .iter()
        .flat_map(|fields| fields.keys().map(String::as_str))
        .collect();

    let rows = keyed
        .iter()
        .map(|fields| {
            headers
                .iter()
                .map(|h| fields.get(*h).cloned().unwrap_or_default())
                .collect()
        })
        .collect();

    Sheet {
        headers: headers.into_iter().map(str::to_string).collect(),
        rows,
    }
}
