//! CLI integration tests
//!
//! Runs the `price-editor` binary against fixture workbooks.

#![allow(deprecated)] // Command::cargo_bin deprecation - no stable replacement yet

mod common;

use assert_cmd::Command;
use common::{fixture_dir, write_custom, FIXTURE_CSV};
use predicates::prelude::*;
use price_editor::prices::read_prices;
use price_editor::workbook::CellValue;
use price_editor::PriceWorkbook;
use tempfile::TempDir;

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("price-editor").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

// ═══════════════════════════════════════════════════════════════════════════
// HELP AND VERSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cli_help() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("price-editor"))
        .stdout(predicate::str::contains("COMMANDS"));
}

#[test]
fn test_cli_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_serve_help_lists_endpoints() {
    cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/export.csv"))
        .stdout(predicate::str::contains("PRICE_EDITOR_PORT"));
}

// ═══════════════════════════════════════════════════════════════════════════
// SHOW / SHEETS / CHECK
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_show_prints_prices() {
    let (_dir, path) = fixture_dir();
    cmd()
        .arg("show")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("D4 - Price 1: 10.5"))
        .stdout(predicate::str::contains("D6 - Price 3: 15.75"));
}

#[test]
fn test_show_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    cmd()
        .arg("show")
        .arg(dir.path().join("missing.xlsx"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_sheets_lists_names() {
    let (_dir, path) = fixture_dir();
    cmd()
        .arg("sheets")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Prices"))
        .stdout(predicate::str::contains("Export"));
}

#[test]
fn test_check_lists_formulas() {
    let (_dir, path) = fixture_dir();
    cmd()
        .arg("check")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("C2: =Prices!D4"))
        .stdout(predicate::str::contains("C3: =Prices!D5*2"));
}

// ═══════════════════════════════════════════════════════════════════════════
// SET
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_set_updates_file() {
    let (_dir, path) = fixture_dir();
    cmd()
        .arg("set")
        .arg(&path)
        .args(["10.5", "20", "18", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prices updated successfully"));

    let values = read_prices(&PriceWorkbook::open(&path).unwrap()).unwrap();
    assert_eq!(values[2], CellValue::Number(18.0));
    assert_eq!(values[0], CellValue::Number(10.5));
}

#[test]
fn test_set_accepts_negative_values() {
    let (_dir, path) = fixture_dir();
    cmd()
        .arg("set")
        .arg(&path)
        .args(["-3", "20", "-0.5", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prices updated successfully"));

    let values = read_prices(&PriceWorkbook::open(&path).unwrap()).unwrap();
    assert_eq!(values[0], CellValue::Number(-3.0));
    assert_eq!(values[2], CellValue::Number(-0.5));
}

#[test]
fn test_set_rejects_non_numbers() {
    let (_dir, path) = fixture_dir();
    let before = std::fs::read(&path).unwrap();

    cmd()
        .arg("set")
        .arg(&path)
        .args(["1", "abc", "3", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("D5: 'abc' is not a number"));

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

// ═══════════════════════════════════════════════════════════════════════════
// EXPORT
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_export_to_stdout() {
    let (_dir, path) = fixture_dir();
    cmd()
        .arg("export")
        .arg(&path)
        .assert()
        .success()
        .stdout(FIXTURE_CSV);
}

#[test]
fn test_export_to_file() {
    let (dir, path) = fixture_dir();
    let output = dir.path().join("export_data.csv");

    cmd()
        .arg("export")
        .arg(&path)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported"));

    assert_eq!(std::fs::read_to_string(&output).unwrap(), FIXTURE_CSV);
}

#[test]
fn test_export_missing_sheet_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_custom(dir.path(), "book.xlsx", [1.0, 2.0, 3.0, 4.0], false);

    cmd()
        .arg("export")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("'Export' sheet not found"));
}
