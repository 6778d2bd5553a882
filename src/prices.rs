//! Price form: read D4..D7, validate edits, save them back
//!
//! The form holds raw text so a rejected edit survives a failed save and
//! the user can correct it without retyping the other fields.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::layout::{PriceLayout, PRICE_COUNT, PRICE_LAYOUT};
use crate::workbook::{CellValue, PriceWorkbook};

/// Four validated prices, in layout order (D4, D5, D6, D7)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceValues(pub [f64; PRICE_COUNT]);

impl PriceValues {
    pub fn new(values: [f64; PRICE_COUNT]) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64; PRICE_COUNT] {
        &self.0
    }
}

/// Current contents of the price cells. `Empty` where a cell is unset.
pub fn read_prices(workbook: &PriceWorkbook) -> PriceEditorResult<[CellValue; PRICE_COUNT]> {
    let layout = &PRICE_LAYOUT;
    let sheet = workbook.sheet(layout.prices_sheet).ok_or_else(|| {
        PriceEditorError::Load(format!(
            "'{}' sheet not found in the workbook",
            layout.prices_sheet
        ))
    })?;

    Ok(layout.cells.map(|p| sheet.value(p.cell)))
}

/// Parse one field. Accepts any finite decimal, surrounding whitespace ignored.
pub fn parse_price(address: &str, input: &str) -> PriceEditorResult<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PriceEditorError::Validation(format!(
            "{} is empty; enter a number",
            address
        )));
    }

    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        _ => Err(PriceEditorError::Validation(format!(
            "{}: '{}' is not a number",
            address, trimmed
        ))),
    }
}

/// One field of the price form
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceField {
    pub address: String,
    pub label: &'static str,
    pub input: String,
    /// Inline validation message for this field
    pub error: Option<String>,
}

/// The editable form state: four text fields mirroring D4..D7
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceForm {
    pub fields: [PriceField; PRICE_COUNT],
}

impl Default for PriceForm {
    fn default() -> Self {
        Self::with_inputs(Default::default())
    }
}

impl PriceForm {
    /// A form showing the given raw inputs
    pub fn with_inputs(inputs: [String; PRICE_COUNT]) -> Self {
        let layout: &PriceLayout = &PRICE_LAYOUT;
        let mut inputs = inputs.into_iter();
        let fields = layout.cells.map(|p| PriceField {
            address: p.cell.a1(),
            label: p.label,
            input: inputs.next().unwrap_or_default(),
            error: None,
        });
        Self { fields }
    }

    /// Pre-populate from the workbook's current cell values
    pub fn from_workbook(workbook: &PriceWorkbook) -> PriceEditorResult<Self> {
        let values = read_prices(workbook)?;
        Ok(Self::with_inputs(values.map(|v| v.to_string())))
    }

    pub fn inputs(&self) -> [&str; PRICE_COUNT] {
        [
            self.fields[0].input.as_str(),
            self.fields[1].input.as_str(),
            self.fields[2].input.as_str(),
            self.fields[3].input.as_str(),
        ]
    }

    pub fn has_errors(&self) -> bool {
        self.fields.iter().any(|f| f.error.is_some())
    }

    /// Validate every field, recording inline errors on the form.
    /// Returns all messages joined when any field is invalid.
    pub fn validate(&mut self) -> PriceEditorResult<PriceValues> {
        let mut values = [0.0; PRICE_COUNT];
        let mut errors = Vec::new();

        for (i, field) in self.fields.iter_mut().enumerate() {
            match parse_price(&field.address, &field.input) {
                Ok(n) => {
                    values[i] = n;
                    field.error = None;
                }
                Err(e) => {
                    let message = match e {
                        PriceEditorError::Validation(m) => m,
                        other => other.to_string(),
                    };
                    field.error = Some(message.clone());
                    errors.push(message);
                }
            }
        }

        if errors.is_empty() {
            Ok(PriceValues(values))
        } else {
            Err(PriceEditorError::Validation(errors.join("; ")))
        }
    }
}

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveReport {
    pub cells: Vec<(String, f64)>,
    pub saved_at: DateTime<Local>,
}

/// Write the four prices into the Prices sheet and persist the workbook.
///
/// Only D4..D7 change in the file. The workbook is only updated in memory
/// once the file write succeeds, so a failed save leaves both the file and
/// the handle as they were.
pub fn save_prices(
    workbook: &mut PriceWorkbook,
    values: &PriceValues,
) -> PriceEditorResult<SaveReport> {
    let layout = &PRICE_LAYOUT;
    let targets: Vec<_> = layout
        .cells
        .iter()
        .zip(values.values())
        .map(|(price, value)| (price.cell, *value))
        .collect();

    if let Err(e) = workbook.save_numbers(layout.prices_sheet, &targets) {
        warn!(
            path = %workbook.path().display(),
            kind = e.kind(),
            error = %e,
            "price save failed"
        );
        return Err(e);
    }

    let cells: Vec<(String, f64)> = targets
        .iter()
        .map(|(cell, value)| (cell.a1(), *value))
        .collect();
    info!(path = %workbook.path().display(), ?cells, "prices saved");

    Ok(SaveReport {
        cells,
        saved_at: Local::now(),
    })
}
