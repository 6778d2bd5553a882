//! Price Editor - edit four prices in an Excel workbook and export a sheet as CSV
//!
//! This library loads a workbook, exposes cells D4-D7 of the `Prices` sheet
//! for editing, writes validated values back to the file, and renders the
//! `Export` sheet as CSV.
//!
//! # Features
//!
//! - Workbook import via calamine (xlsx, xlsm, xlsb, xls, ods)
//! - In-place write-back of D4-D7 into .xlsx/.xlsm packages (zip + quick-xml)
//! - All-or-nothing price validation
//! - CSV export with a short preview
//! - Formula diagnostics for the `Export` sheet
//! - Web editor and JSON API with per-session uploads
//!
//! # Example
//!
//! ```no_run
//! use price_editor::prices::{read_prices, save_prices, PriceValues};
//! use price_editor::export::export_csv;
//! use price_editor::PriceWorkbook;
//!
//! let mut workbook = PriceWorkbook::open("your_workbook.xlsx")?;
//! println!("Current: {:?}", read_prices(&workbook)?);
//!
//! save_prices(&mut workbook, &PriceValues::new([10.5, 20.0, 15.75, 5.0]))?;
//!
//! let csv = export_csv(&workbook)?;
//! println!("{} bytes of {}", csv.bytes.len(), csv.filename);
//! # Ok::<(), price_editor::error::PriceEditorError>(())
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod excel;
pub mod export;
pub mod layout;
pub mod prices;
pub mod session;
pub mod workbook;

// Re-export commonly used types
pub use error::{PriceEditorError, PriceEditorResult};
pub use layout::{CellRef, PriceLayout, PRICE_LAYOUT};
pub use prices::{PriceForm, PriceValues};
pub use workbook::{CellValue, PriceWorkbook};
