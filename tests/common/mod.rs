//! Shared workbook fixtures for integration tests

#![allow(dead_code)] // not every test binary uses every fixture

use rust_xlsxwriter::{ExcelDateTime, Format, Formula, Workbook};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Zip entry holding the Prices sheet in fixtures built here
pub const PRICES_PART: &str = "xl/worksheets/sheet1.xml";

/// CSV produced by the standard fixture's Export sheet
pub const FIXTURE_CSV: &str =
    "Handle,Title,Variant Price\nshirt,\"T-Shirt, Blue\",10.5\nmug,Mug,40\n";

/// Prices D4..D7 and an Export sheet whose formulas read them
pub fn fixture_bytes(prices: [f64; 4], with_export: bool) -> Vec<u8> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Prices").unwrap();
    sheet.write_string(0, 0, "Price list").unwrap();
    for (i, price) in prices.iter().enumerate() {
        let row = 3 + i as u32;
        sheet.write_string(row, 2, format!("Price {}", i + 1)).unwrap();
        sheet.write_number(row, 3, *price).unwrap();
    }

    if with_export {
        let export = workbook.add_worksheet();
        export.set_name("Export").unwrap();
        export.write_string(0, 0, "Handle").unwrap();
        export.write_string(0, 1, "Title").unwrap();
        export.write_string(0, 2, "Variant Price").unwrap();
        export.write_string(1, 0, "shirt").unwrap();
        export.write_string(1, 1, "T-Shirt, Blue").unwrap();
        export
            .write_formula(1, 2, Formula::new("=Prices!D4").set_result("10.5"))
            .unwrap();
        export.write_string(2, 0, "mug").unwrap();
        export.write_string(2, 1, "Mug").unwrap();
        export
            .write_formula(2, 2, Formula::new("=Prices!D5*2").set_result("40"))
            .unwrap();
    }

    workbook.save_to_buffer().unwrap()
}

/// The standard prices laid out with formatting a rebuild would lose: a
/// merged bold title, a wide label column, a `0.00` number format on
/// D4:D7, a defined name, and a `yyyy-mm-dd` date at Export!A2
pub fn formatted_fixture_bytes() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let title = Format::new().set_bold();
    let money = Format::new().set_num_format("0.00");
    let day = Format::new().set_num_format("yyyy-mm-dd");

    let sheet = workbook.add_worksheet();
    sheet.set_name("Prices").unwrap();
    sheet.merge_range(0, 0, 0, 2, "Price list", &title).unwrap();
    sheet.set_column_width(2, 24).unwrap();
    for (i, price) in [10.5, 20.0, 15.75, 5.0].iter().enumerate() {
        let row = 3 + i as u32;
        sheet.write_string(row, 2, format!("Price {}", i + 1)).unwrap();
        sheet.write_number_with_format(row, 3, *price, &money).unwrap();
    }

    let export = workbook.add_worksheet();
    export.set_name("Export").unwrap();
    export.write_string(0, 0, "When").unwrap();
    let when = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
    export.write_datetime_with_format(1, 0, &when, &day).unwrap();

    workbook.define_name("PriceCells", "=Prices!$D$4:$D$7").unwrap();
    workbook.save_to_buffer().unwrap()
}

/// A temp dir holding the formatted fixture as `formatted.xlsx`
pub fn formatted_fixture_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("formatted.xlsx");
    std::fs::write(&path, formatted_fixture_bytes()).unwrap();
    (dir, path)
}

/// Every entry of an xlsx package: (name, uncompressed bytes)
pub fn zip_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), data)
        })
        .collect()
}

/// One entry of an xlsx package as text
pub fn zip_text(bytes: &[u8], name: &str) -> String {
    zip_entries(bytes)
        .into_iter()
        .find(|(entry, _)| entry == name)
        .map(|(_, data)| String::from_utf8(data).unwrap())
        .unwrap_or_else(|| panic!("no {} in package", name))
}

/// Write the standard fixture (10.5, 20, 15.75, 5) to `dir/name`
pub fn write_fixture(dir: &Path, name: &str) -> PathBuf {
    write_custom(dir, name, [10.5, 20.0, 15.75, 5.0], true)
}

pub fn write_custom(dir: &Path, name: &str, prices: [f64; 4], with_export: bool) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, fixture_bytes(prices, with_export)).unwrap();
    path
}

/// A temp dir holding the standard fixture as `your_workbook.xlsx`
pub fn fixture_dir() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = write_fixture(dir.path(), "your_workbook.xlsx");
    (dir, path)
}
