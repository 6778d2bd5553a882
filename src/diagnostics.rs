//! Formula diagnostics for the Export sheet
//!
//! Saving new prices only changes the export if Export-sheet formulas
//! actually read the Prices sheet. This finds the ones that do.

use regex::Regex;
use serde::Serialize;

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::layout::PRICE_LAYOUT;
use crate::workbook::PriceWorkbook;

/// An Export-sheet formula that reads the prices
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaReference {
    pub cell: String,
    /// Formula text including the leading `=`
    pub formula: String,
}

/// Matches formulas that mention the prices sheet or a price cell
pub struct PriceReferenceMatcher {
    pattern: Regex,
}

impl PriceReferenceMatcher {
    pub fn new() -> PriceEditorResult<Self> {
        let layout = &PRICE_LAYOUT;
        let sheet = regex::escape(layout.prices_sheet);
        let cells = layout
            .cells
            .iter()
            .map(|p| {
                let addr = p.cell.a1();
                let split = addr.find(|c: char| c.is_ascii_digit()).unwrap_or(addr.len());
                format!(r"\$?{}\$?{}", &addr[..split], &addr[split..])
            })
            .collect::<Vec<_>>()
            .join("|");

        // Sheet prefix (plain or quoted), or a bare price cell not preceded by
        // a letter (so AD4 does not count) and not followed by a digit (D40).
        let pattern = format!(
            r"(?i)(?:'{sheet}'!|\b{sheet}!|(?:^|[^A-Za-z0-9_$])(?:{cells})(?:[^0-9]|$))"
        );

        let pattern = Regex::new(&pattern)
            .map_err(|e| PriceEditorError::Config(format!("Regex error: {}", e)))?;

        Ok(Self { pattern })
    }

    pub fn is_match(&self, formula: &str) -> bool {
        self.pattern.is_match(formula)
    }
}

/// Formulas in the Export sheet that refer to the prices, in row-major order.
/// Empty when the workbook has no Export sheet.
pub fn price_formula_references(
    workbook: &PriceWorkbook,
) -> PriceEditorResult<Vec<FormulaReference>> {
    let Some(sheet) = workbook.sheet(PRICE_LAYOUT.export_sheet) else {
        return Ok(Vec::new());
    };

    let matcher = PriceReferenceMatcher::new()?;
    Ok(sheet
        .cells()
        .filter_map(|(cell, data)| {
            let formula = data.formula.as_deref()?;
            matcher.is_match(formula).then(|| FormulaReference {
                cell: cell.a1(),
                formula: format!("={}", formula),
            })
        })
        .collect())
}
