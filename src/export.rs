//! CSV export of the Export sheet
//!
//! Pure read-and-serialize: nothing here mutates the workbook.

use serde::Serialize;
use tracing::info;

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::layout::{CellRef, PRICE_LAYOUT};
use crate::workbook::{PriceWorkbook, SheetData};

/// Rows shown in the on-page preview
pub const PREVIEW_ROWS: usize = 10;

/// A finished CSV download
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub filename: &'static str,
    pub bytes: Vec<u8>,
}

impl CsvExport {
    pub const CONTENT_TYPE: &'static str = "text/csv; charset=utf-8";
}

/// The populated grid of a sheet as display strings, padded to equal width.
/// The grid spans the bounding box of populated cells.
pub fn sheet_rows(sheet: &SheetData) -> Vec<Vec<String>> {
    let Some((min, max)) = sheet.bounds() else {
        return Vec::new();
    };

    (min.row..=max.row)
        .map(|row| {
            (min.col..=max.col)
                .map(|col| sheet.value(CellRef::new(row, col)).to_string())
                .collect()
        })
        .collect()
}

fn export_sheet(workbook: &PriceWorkbook) -> PriceEditorResult<&SheetData> {
    let name = PRICE_LAYOUT.export_sheet;
    workbook.sheet(name).ok_or_else(|| {
        PriceEditorError::Export(format!(
            "'{}' sheet not found (available: {})",
            name,
            workbook.sheet_names().join(", ")
        ))
    })
}

/// Serialize rows as CSV: `\n` line endings, quoting only where needed
pub fn rows_to_csv(rows: &[Vec<String>]) -> PriceEditorResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(Vec::new());

    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| PriceEditorError::Export(format!("Failed to write CSV row: {}", e)))?;
    }

    writer
        .into_inner()
        .map_err(|e| PriceEditorError::Export(format!("Failed to finish CSV: {}", e)))
}

/// Export the Export sheet as a CSV download
pub fn export_csv(workbook: &PriceWorkbook) -> PriceEditorResult<CsvExport> {
    let sheet = export_sheet(workbook)?;
    let rows = sheet_rows(sheet);
    let bytes = rows_to_csv(&rows)?;

    info!(
        sheet = %sheet.name,
        rows = rows.len(),
        bytes = bytes.len(),
        "exported CSV"
    );

    Ok(CsvExport {
        filename: PRICE_LAYOUT.export_filename,
        bytes,
    })
}

/// First rows of the Export sheet for on-page display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPreview {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Data rows in the sheet, header excluded
    pub total_rows: usize,
}

impl ExportPreview {
    /// Data rows not shown in the preview
    pub fn hidden_rows(&self) -> usize {
        self.total_rows.saturating_sub(self.rows.len())
    }
}

pub fn preview_export(workbook: &PriceWorkbook) -> PriceEditorResult<ExportPreview> {
    let sheet = export_sheet(workbook)?;
    let mut rows = sheet_rows(sheet).into_iter();
    let header = rows.next().unwrap_or_default();
    let data: Vec<Vec<String>> = rows.collect();

    Ok(ExportPreview {
        header,
        total_rows: data.len(),
        rows: data.into_iter().take(PREVIEW_ROWS).collect(),
    })
}
