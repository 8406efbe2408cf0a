use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::ser::{Serialize, SerializeMap, Serializer};

use docsheet_core::Record;

use crate::sheet::{Sheet, build_sheet};
use crate::{ExportError, ExportFormat};

/// Excel refuses cell strings longer than this.
const XLSX_MAX_CELL_CHARS: usize = 32_767;

const SHEET_NAME: &str = "Extraction";

/// Lay out `records` and write them to `path` in `format`.
///
/// The sheet is built before the destination is touched, so an empty
/// extraction never creates a file.
pub fn export_records(
    records: &[Record],
    format: ExportFormat,
    path: &Path,
) -> Result<Sheet, ExportError> {
    let sheet = build_sheet(records)?;
    let bytes = render(&sheet, format)?;
    std::fs::write(path, bytes)?;
    tracing::info!(
        path = %path.display(),
        format = format.extension(),
        rows = sheet.rows.len(),
        columns = sheet.headers.len(),
        "wrote sheet"
    );
    Ok(sheet)
}

/// Encode a sheet without writing it anywhere.
pub fn render(sheet: &Sheet, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Xlsx => render_xlsx(sheet),
        ExportFormat::Csv => Ok(render_csv(sheet).into_bytes()),
        ExportFormat::Json => Ok(render_json(sheet)?.into_bytes()),
    }
}

fn clip_cell(value: &str) -> &str {
    match value.char_indices().nth(XLSX_MAX_CELL_CHARS) {
        Some((byte_idx, _)) => {
            tracing::warn!(chars = value.chars().count(), "cell truncated to XLSX limit");
            &value[..byte_idx]
        }
        None => value,
    }
}

pub fn render_xlsx(sheet: &Sheet) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in sheet.headers.iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
        worksheet.write_string_with_format(0, col, clip_cell(header), &bold)?;
    }

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
        for (col, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let col = u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)?;
            worksheet.write_string(row_num, col, clip_cell(value))?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn csv_line(cells: &[String]) -> String {
    cells
        .iter()
        .map(|c| csv_escape(c))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn render_csv(sheet: &Sheet) -> String {
    let mut out = csv_line(&sheet.headers);
    out.push('\n');
    for row in &sheet.rows {
        out.push_str(&csv_line(row));
        out.push('\n');
    }
    out
}

/// One row as a JSON object whose keys follow header order.
struct JsonRow<'a> {
    headers: &'a [String],
    cells: &'a [String],
}

impl Serialize for JsonRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (header, cell) in self.headers.iter().zip(self.cells) {
            map.serialize_entry(header, cell)?;
        }
        map.end()
    }
}

pub fn render_json(sheet: &Sheet) -> Result<String, ExportError> {
    let rows: Vec<JsonRow<'_>> = sheet
        .rows
        .iter()
        .map(|cells| JsonRow {
            headers: &sheet.headers,
            cells,
        })
        .collect();
    let mut out = serde_json::to_string_pretty(&rows)?;
    out.push('\n');
    Ok(out)
}
