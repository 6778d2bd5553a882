//! Workbook importer - Excel file → sheets

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::layout::CellRef;
use crate::workbook::{CellValue, SheetData};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads every sheet of a workbook into memory
pub struct WorkbookImporter {
    path: PathBuf,
}

impl WorkbookImporter {
    /// Create a new importer for the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Import all sheets from the file, returning the file's bytes with them
    pub fn import(&self) -> PriceEditorResult<(Vec<u8>, Vec<SheetData>)> {
        if !self.path.exists() {
            return Err(PriceEditorError::Load(format!(
                "File not found: {}",
                self.path.display()
            )));
        }

        let bytes = std::fs::read(&self.path).map_err(|e| {
            PriceEditorError::Load(format!("Failed to read {}: {}", self.path.display(), e))
        })?;

        let sheets = Self::import_bytes(&bytes)?;
        Ok((bytes, sheets))
    }

    /// Import all sheets from raw file contents. The format is detected
    /// from the bytes, so the file extension does not matter.
    pub fn import_bytes(bytes: &[u8]) -> PriceEditorResult<Vec<SheetData>> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| PriceEditorError::Load(format!("Not a valid spreadsheet: {}", e)))?;

        let sheet_names = workbook.sheet_names().to_vec();
        if sheet_names.is_empty() {
            return Err(PriceEditorError::Load(
                "Workbook contains no sheets".to_string(),
            ));
        }

        let mut sheets = Vec::with_capacity(sheet_names.len());
        for name in sheet_names {
            sheets.push(Self::import_sheet(&mut workbook, &name)?);
        }

        Ok(sheets)
    }

    fn import_sheet(
        workbook: &mut Sheets<Cursor<&[u8]>>,
        name: &str,
    ) -> PriceEditorResult<SheetData> {
        let range = workbook.worksheet_range(name).map_err(|e| {
            PriceEditorError::Load(format!("Failed to read sheet '{}': {}", name, e))
        })?;

        let mut sheet = SheetData::new(name);
        let (start_row, start_col) = range.start().unwrap_or((0, 0));

        for (row, col, data) in range.used_cells() {
            let value = convert_data(data);
            if value.is_empty() {
                continue;
            }
            sheet.set_value(absolute(start_row, start_col, row, col), value);
        }

        // Not every format exposes formulas (xls, ods); values are enough then
        if let Ok(formulas) = workbook.worksheet_formula(name) {
            Self::import_formulas(&mut sheet, &formulas);
        }

        debug!(sheet = name, cells = sheet.len(), "imported sheet");
        Ok(sheet)
    }

    fn import_formulas(sheet: &mut SheetData, formulas: &Range<String>) {
        let (start_row, start_col) = formulas.start().unwrap_or((0, 0));

        for (row, col, formula) in formulas.used_cells() {
            if formula.is_empty() {
                continue;
            }
            // calamine strips the leading '=' already; keep the text bare
            let formula = formula.strip_prefix('=').unwrap_or(formula);
            sheet.set_formula(absolute(start_row, start_col, row, col), formula);
        }
    }
}

fn absolute(start_row: u32, start_col: u32, row: usize, col: usize) -> CellRef {
    CellRef::new(start_row + row as u32, (start_col as usize + col) as u16)
}

/// Convert a calamine cell to a `CellValue`. Durations keep their serial number.
fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::DateTime)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// ODS stores dates as ISO text: `2024-01-15T10:30:00` or `2024-01-15`
fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>().ok().or_else(|| {
        s.parse::<NaiveDate>()
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_data_numbers() {
        assert_eq!(convert_data(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(convert_data(&Data::Float(10.5)), CellValue::Number(10.5));
    }

    #[test]
    fn test_convert_data_text_and_bool() {
        assert_eq!(
            convert_data(&Data::String("SKU-1".to_string())),
            CellValue::Text("SKU-1".to_string())
        );
        assert_eq!(convert_data(&Data::String(String::new())), CellValue::Empty);
        assert_eq!(convert_data(&Data::Bool(true)), CellValue::Bool(true));
        assert_eq!(convert_data(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn test_convert_data_error() {
        let value = convert_data(&Data::Error(calamine::CellErrorType::Div0));
        assert_eq!(value, CellValue::Error("#DIV/0!".to_string()));
    }

    #[test]
    fn test_convert_data_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let serial = calamine::ExcelDateTime::new(
            45306.0,
            calamine::ExcelDateTimeType::DateTime,
            false,
        );
        assert_eq!(
            convert_data(&Data::DateTime(serial)),
            CellValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            convert_data(&Data::DateTimeIso("2024-01-15T10:30:00".to_string())),
            CellValue::DateTime(date.and_hms_opt(10, 30, 0).unwrap())
        );
        assert_eq!(
            convert_data(&Data::DateTimeIso("2024-01-15".to_string())),
            CellValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            convert_data(&Data::DateTimeIso("soon".to_string())),
            CellValue::Text("soon".to_string())
        );
    }

    #[test]
    fn test_convert_data_duration_keeps_serial() {
        let duration =
            calamine::ExcelDateTime::new(1.5, calamine::ExcelDateTimeType::TimeDelta, false);
        assert_eq!(convert_data(&Data::DateTime(duration)), CellValue::Number(1.5));
    }

    #[test]
    fn test_absolute_offsets() {
        assert_eq!(absolute(3, 2, 0, 0), CellRef::new(3, 2));
        assert_eq!(absolute(3, 2, 1, 4), CellRef::new(4, 6));
    }

    #[test]
    fn test_import_missing_file() {
        let result = WorkbookImporter::new("definitely/not/here.xlsx").import();
        match result {
            Err(PriceEditorError::Load(msg)) => assert!(msg.contains("File not found")),
            other => panic!("expected load error, got {:?}", other),
        }
    }

    #[test]
    fn test_import_bytes_rejects_garbage() {
        let result = WorkbookImporter::import_bytes(b"this is not a spreadsheet");
        assert!(matches!(result, Err(PriceEditorError::Load(_))));
    }
}
