use crate::diagnostics::price_formula_references;
use crate::error::{PriceEditorError, PriceEditorResult};
use crate::export::export_csv;
use crate::layout::{PRICE_COUNT, PRICE_LAYOUT};
use crate::prices::{read_prices, save_prices, PriceForm};
use crate::workbook::{format_number, PriceWorkbook};
use colored::Colorize;
use std::io::Write;
use std::path::PathBuf;

/// Execute the show command
pub fn show(file: PathBuf) -> PriceEditorResult<()> {
    let workbook = PriceWorkbook::open(&file)?;
    let values = read_prices(&workbook)?;

    println!("{}", "💰 Price Editor - Current prices".bold().green());
    println!("   File: {}", file.display());
    println!("   Sheet: {}", PRICE_LAYOUT.prices_sheet);
    println!();

    for (price, value) in PRICE_LAYOUT.cells.iter().zip(values) {
        let text = if value.is_empty() {
            "(empty)".dimmed().to_string()
        } else if value.as_number().is_none() {
            format!("{} {}", value, "(not a number)".yellow())
        } else {
            value.to_string().bright_white().bold().to_string()
        };
        println!("   {} - {}: {}", price.cell.a1().cyan(), price.label, text);
    }

    Ok(())
}

/// Execute the set command
pub fn set(file: PathBuf, inputs: [String; PRICE_COUNT], verbose: bool) -> PriceEditorResult<()> {
    println!("{}", "💾 Price Editor - Updating prices".bold().green());
    println!("   File: {}", file.display());
    println!();

    let mut form = PriceForm::with_inputs(inputs);
    let values = match form.validate() {
        Ok(values) => values,
        Err(e) => {
            for error in form.fields.iter().filter_map(|f| f.error.as_ref()) {
                eprintln!("   {} {}", "❌".red(), error.red());
            }
            return Err(e);
        }
    };

    let mut workbook = PriceWorkbook::open(&file)?;
    if verbose {
        let before = read_prices(&workbook)?;
        println!("{}", "📖 Previous values:".cyan());
        for (price, value) in PRICE_LAYOUT.cells.iter().zip(before) {
            println!("   {}: {}", price.cell, value);
        }
        println!();
    }

    let report = save_prices(&mut workbook, &values)?;

    println!("{}", "✅ Prices updated successfully!".bold().green());
    for (cell, value) in &report.cells {
        println!("   • {}: {}", cell, format_number(*value));
    }

    Ok(())
}

/// Execute the export command
pub fn export(file: PathBuf, output: Option<PathBuf>) -> PriceEditorResult<()> {
    let workbook = PriceWorkbook::open(&file)?;
    let csv = export_csv(&workbook)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &csv.bytes).map_err(|e| {
                PriceEditorError::Export(format!("Failed to write {}: {}", path.display(), e))
            })?;
            println!(
                "{} {} ({} bytes)",
                "📥 Exported".bold().green(),
                path.display(),
                csv.bytes.len()
            );
        }
        None => {
            std::io::stdout().write_all(&csv.bytes)?;
        }
    }

    Ok(())
}

/// Execute the sheets command
pub fn sheets(file: PathBuf) -> PriceEditorResult<()> {
    let workbook = PriceWorkbook::open(&file)?;

    println!("{}", "📋 Available Sheets".bold().green());
    for name in workbook.sheet_names() {
        let marker = if name == PRICE_LAYOUT.prices_sheet {
            "💰"
        } else if name == PRICE_LAYOUT.export_sheet {
            "📊"
        } else {
            "📄"
        };
        println!("   {} {}", marker, name);
    }

    Ok(())
}

/// Execute the check command: show which Export formulas read the prices
pub fn check(file: PathBuf) -> PriceEditorResult<()> {
    let workbook = PriceWorkbook::open(&file)?;

    println!("{}", "🔍 Price Editor - Formula diagnostics".bold().green());
    println!("   File: {}", file.display());
    println!();

    if !workbook.has_sheet(PRICE_LAYOUT.export_sheet) {
        println!(
            "{}",
            format!("⚠️  '{}' sheet not found", PRICE_LAYOUT.export_sheet).yellow()
        );
        return Ok(());
    }

    let references = price_formula_references(&workbook)?;
    if references.is_empty() {
        println!(
            "{}",
            format!(
                "⚠️  No formulas in '{}' reference the '{}' sheet or cells D4-D7",
                PRICE_LAYOUT.export_sheet, PRICE_LAYOUT.prices_sheet
            )
            .yellow()
        );
        println!("   Price edits will not change the exported CSV.");
        return Ok(());
    }

    println!(
        "{}",
        format!("Formulas referencing {}:", PRICE_LAYOUT.prices_sheet).cyan()
    );
    for reference in &references {
        println!("   • {}: {}", reference.cell.bold(), reference.formula);
    }

    Ok(())
}
