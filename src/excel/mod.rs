//! Excel read/write for price workbooks
//!
//! - Import: any calamine-readable workbook (.xlsx, .xlsm, .xlsb, .xls, .ods) → sheets
//! - Patch: numbers written into an existing .xlsx package in place

mod importer;
mod patcher;

pub use importer::WorkbookImporter;
pub use patcher::{is_xlsx_package, patch_numbers, CellPatch};
