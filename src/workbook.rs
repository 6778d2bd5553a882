//! In-memory workbook model
//!
//! A `PriceWorkbook` is the session's exclusive handle to one workbook file:
//! every sheet's populated cells (value + optional formula) and the path the
//! workbook is saved back to.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::excel::{is_xlsx_package, patch_numbers, CellPatch, WorkbookImporter};
use crate::layout::{CellRef, PRICES_SHEET};

/// A cell's (cached) value
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    /// Excel error literal, e.g. `#DIV/0!`
    Error(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl fmt::Display for CellValue {
    /// Display form used by the form fields and the CSV export.
    /// Integral numbers print without a decimal point.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => f.write_str(&format_number(*n)),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Bool(true) => f.write_str("TRUE"),
            CellValue::Bool(false) => f.write_str("FALSE"),
            CellValue::Error(e) => f.write_str(e),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Format a number the way a spreadsheet user expects to read it back
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A populated cell
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    /// Formula text without the leading `=`
    pub formula: Option<String>,
}

impl Cell {
    pub fn value(value: CellValue) -> Self {
        Self {
            value,
            formula: None,
        }
    }

    pub fn formula(formula: impl Into<String>, cached: CellValue) -> Self {
        Self {
            value: cached,
            formula: Some(formula.into()),
        }
    }
}

/// One named sheet, cells keyed in row-major order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetData {
    pub name: String,
    cells: BTreeMap<CellRef, Cell>,
}

impl SheetData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    pub fn get(&self, cell: CellRef) -> Option<&Cell> {
        self.cells.get(&cell)
    }

    /// Cached value at `cell`, `Empty` when unpopulated
    pub fn value(&self, cell: CellRef) -> CellValue {
        self.cells
            .get(&cell)
            .map(|c| c.value.clone())
            .unwrap_or(CellValue::Empty)
    }

    pub fn insert(&mut self, cell: CellRef, data: Cell) {
        self.cells.insert(cell, data);
    }

    /// Overwrite `cell` with a plain value, dropping any formula it held
    pub fn set_value(&mut self, cell: CellRef, value: CellValue) {
        if value.is_empty() {
            self.cells.remove(&cell);
        } else {
            self.cells.insert(cell, Cell::value(value));
        }
    }

    /// Attach a formula to `cell`, keeping whatever cached value it has
    pub fn set_formula(&mut self, cell: CellRef, formula: impl Into<String>) {
        let entry = self
            .cells
            .entry(cell)
            .or_insert_with(|| Cell::value(CellValue::Empty));
        entry.formula = Some(formula.into());
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bounding box of populated cells: (top-left, bottom-right)
    pub fn bounds(&self) -> Option<(CellRef, CellRef)> {
        let mut iter = self.cells.keys();
        let first = *iter.next()?;
        let (mut min, mut max) = (first, first);
        for cell in self.cells.keys() {
            min.row = min.row.min(cell.row);
            min.col = min.col.min(cell.col);
            max.row = max.row.max(cell.row);
            max.col = max.col.max(cell.col);
        }
        Some((min, max))
    }
}

/// Exclusive handle to a workbook file
///
/// Holds the file's bytes as last read or written. Saves patch those bytes
/// rather than rebuilding the workbook from the parsed cells.
#[derive(Clone, PartialEq)]
pub struct PriceWorkbook {
    path: PathBuf,
    source: Vec<u8>,
    sheets: Vec<SheetData>,
}

impl fmt::Debug for PriceWorkbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceWorkbook")
            .field("path", &self.path)
            .field("source_len", &self.source.len())
            .field("sheets", &self.sheets)
            .finish()
    }
}

impl PriceWorkbook {
    /// Open the workbook at `path`. The file must contain a `Prices` sheet.
    pub fn open<P: AsRef<Path>>(path: P) -> PriceEditorResult<Self> {
        let path = path.as_ref().to_path_buf();
        let (source, sheets) = WorkbookImporter::new(&path).import()?;
        Self::from_parts(path, source, sheets)
    }

    /// Parse raw file contents; `path` is where saves go.
    pub fn from_bytes(path: PathBuf, source: Vec<u8>) -> PriceEditorResult<Self> {
        let sheets = WorkbookImporter::import_bytes(&source)?;
        Self::from_parts(path, source, sheets)
    }

    /// Build a workbook from sheets already in memory, with no file bytes
    /// behind it. Such a workbook cannot be saved.
    #[cfg(test)]
    pub(crate) fn from_sheets(path: PathBuf, sheets: Vec<SheetData>) -> PriceEditorResult<Self> {
        Self::from_parts(path, Vec::new(), sheets)
    }

    fn from_parts(
        path: PathBuf,
        source: Vec<u8>,
        sheets: Vec<SheetData>,
    ) -> PriceEditorResult<Self> {
        let workbook = Self {
            path,
            source,
            sheets,
        };
        if !workbook.has_sheet(PRICES_SHEET) {
            return Err(PriceEditorError::Load(format!(
                "'{}' sheet not found in the workbook (available: {})",
                PRICES_SHEET,
                workbook.sheet_names().join(", ")
            )));
        }
        Ok(workbook)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file contents this handle was loaded from or last saved as
    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }

    /// Only .xlsx/.xlsm packages can be patched; other formats are read-only.
    pub fn is_writable(&self) -> bool {
        is_xlsx_package(&self.source)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetData> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut SheetData> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheets(&self) -> &[SheetData] {
        &self.sheets
    }

    /// Store `values` in `sheet` and overwrite the file in a single write.
    ///
    /// Every other cell, style and part of the file is kept byte-for-byte.
    /// The in-memory cells change only after the write succeeds.
    pub fn save_numbers(
        &mut self,
        sheet: &str,
        values: &[(CellRef, f64)],
    ) -> PriceEditorResult<()> {
        if !self.has_sheet(sheet) {
            return Err(PriceEditorError::Save(format!(
                "'{}' sheet not found in the workbook",
                sheet
            )));
        }

        let patches: Vec<CellPatch> = values
            .iter()
            .map(|(cell, value)| CellPatch::new(*cell, *value))
            .collect();
        let bytes = patch_numbers(&self.source, sheet, &patches)?;

        std::fs::write(&self.path, &bytes).map_err(|e| {
            PriceEditorError::Save(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "workbook written");

        if let Some(target) = self.sheet_mut(sheet) {
            for (cell, value) in values {
                target.set_value(*cell, CellValue::Number(*value));
            }
        }
        self.source = bytes;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet_with(cells: &[(&str, CellValue)]) -> SheetData {
        let mut sheet = SheetData::new("Test");
        for (addr, value) in cells {
            sheet.set_value(addr.parse().unwrap(), value.clone());
        }
        sheet
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(20.0), "20");
        assert_eq!(format_number(10.5), "10.5");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(15.75), "15.75");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::Number(5.0).to_string(), "5");
        assert_eq!(CellValue::Text("abc".into()).to_string(), "abc");
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Error("#N/A".into()).to_string(), "#N/A");

        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            CellValue::DateTime(date.and_hms_opt(0, 0, 0).unwrap()).to_string(),
            "2024-01-15 00:00:00"
        );
        assert_eq!(
            CellValue::DateTime(date.and_hms_milli_opt(9, 5, 3, 250).unwrap()).to_string(),
            "2024-01-15 09:05:03.250"
        );
    }

    #[test]
    fn test_set_value_drops_formula() {
        let mut sheet = SheetData::new("Prices");
        let d4: CellRef = "D4".parse().unwrap();
        sheet.insert(d4, Cell::formula("B4*2", CellValue::Number(8.0)));
        sheet.set_value(d4, CellValue::Number(9.0));
        assert_eq!(sheet.get(d4), Some(&Cell::value(CellValue::Number(9.0))));
    }

    #[test]
    fn test_set_value_empty_removes_cell() {
        let mut sheet = sheet_with(&[("A1", CellValue::Number(1.0))]);
        sheet.set_value("A1".parse().unwrap(), CellValue::Empty);
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_set_formula_keeps_cached_value() {
        let mut sheet = sheet_with(&[("B2", CellValue::Number(3.0))]);
        let b2: CellRef = "B2".parse().unwrap();
        sheet.set_formula(b2, "A1+2");
        let cell = sheet.get(b2).unwrap();
        assert_eq!(cell.value, CellValue::Number(3.0));
        assert_eq!(cell.formula.as_deref(), Some("A1+2"));
    }

    #[test]
    fn test_bounds() {
        let sheet = sheet_with(&[
            ("C2", CellValue::Number(1.0)),
            ("B5", CellValue::Text("x".into())),
            ("E3", CellValue::Bool(false)),
        ]);
        let (min, max) = sheet.bounds().unwrap();
        assert_eq!(min.a1(), "B2");
        assert_eq!(max.a1(), "E5");
        assert!(SheetData::new("Empty").bounds().is_none());
    }

    #[test]
    fn test_from_sheets_requires_prices() {
        let result = PriceWorkbook::from_sheets(
            PathBuf::from("book.xlsx"),
            vec![SheetData::new("Export"), SheetData::new("Other")],
        );
        match result {
            Err(PriceEditorError::Load(msg)) => {
                assert!(msg.contains("'Prices' sheet not found"));
                assert!(msg.contains("Export, Other"));
            }
            other => panic!("expected load error, got {:?}", other),
        }
    }

    #[test]
    fn test_sheet_lookup() {
        let workbook = PriceWorkbook::from_sheets(
            PathBuf::from("book.xlsx"),
            vec![SheetData::new("Prices"), SheetData::new("Export")],
        )
        .unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Prices", "Export"]);
        assert!(workbook.has_sheet("Export"));
        assert!(!workbook.has_sheet("export"));
        assert_eq!(workbook.path(), Path::new("book.xlsx"));
        assert!(!workbook.is_writable());
    }

    #[test]
    fn test_save_numbers_without_package_is_save_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("book.xls");
        let mut workbook =
            PriceWorkbook::from_sheets(path.clone(), vec![SheetData::new("Prices")]).unwrap();
        let before = workbook.clone();

        let result = workbook.save_numbers("Prices", &[(CellRef::new(3, 3), 1.0)]);
        assert!(matches!(result, Err(PriceEditorError::Save(_))));
        assert_eq!(workbook, before);
        assert!(!path.exists());
    }

    #[test]
    fn test_save_numbers_unknown_sheet() {
        let mut workbook = PriceWorkbook::from_sheets(
            PathBuf::from("book.xlsx"),
            vec![SheetData::new("Prices")],
        )
        .unwrap();
        match workbook.save_numbers("Missing", &[(CellRef::new(0, 0), 1.0)]) {
            Err(PriceEditorError::Save(msg)) => assert!(msg.contains("'Missing'")),
            other => panic!("expected save error, got {:?}", other),
        }
    }
}
