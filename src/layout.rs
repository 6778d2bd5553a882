//! Fixed workbook layout
//!
//! The only business rule of the editor: which sheet holds the prices,
//! which four cells are editable, and which sheet is exported.

use std::fmt;
use std::str::FromStr;

use crate::error::{PriceEditorError, PriceEditorResult};

/// Sheet holding the editable price cells
pub const PRICES_SHEET: &str = "Prices";

/// Sheet serialized by the CSV export
pub const EXPORT_SHEET: &str = "Export";

/// Download name for the CSV export
pub const EXPORT_FILENAME: &str = "export_data.csv";

/// Number of editable price cells
pub const PRICE_COUNT: usize = 4;

/// A zero-based cell address (row, column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: u16,
}

impl CellRef {
    pub const fn new(row: u32, col: u16) -> Self {
        Self { row, col }
    }

    /// Excel-style address, e.g. `D4`
    pub fn a1(&self) -> String {
        format!("{}{}", column_letter(self.col), self.row + 1)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

impl FromStr for CellRef {
    type Err = PriceEditorError;

    /// Parse an A1-style address (`D4`, `$D$4`, `aa10`)
    fn from_str(s: &str) -> PriceEditorResult<Self> {
        let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| PriceEditorError::Config(format!("Invalid cell address '{}'", s)))?;
        let (letters, digits) = cleaned.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PriceEditorError::Config(format!(
                "Invalid cell address '{}'",
                s
            )));
        }

        let row: u32 = digits
            .parse()
            .map_err(|_| PriceEditorError::Config(format!("Invalid cell address '{}'", s)))?;
        if row == 0 {
            return Err(PriceEditorError::Config(format!(
                "Invalid cell address '{}': rows start at 1",
                s
            )));
        }

        let col = column_index(letters)
            .ok_or_else(|| PriceEditorError::Config(format!("Invalid cell address '{}'", s)))?;

        Ok(CellRef::new(row - 1, col))
    }
}

/// Convert a zero-based column index to letters (0 → A, 25 → Z, 26 → AA)
pub fn column_letter(col: u16) -> String {
    let mut n = col as u32 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        letters.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Convert column letters to a zero-based index (A → 0, AA → 26)
fn column_index(letters: &str) -> Option<u16> {
    let mut index: u32 = 0;
    for c in letters.chars() {
        index = index * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        if index > u16::MAX as u32 {
            return None;
        }
    }
    Some((index - 1) as u16)
}

/// One editable price cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceCell {
    pub cell: CellRef,
    pub label: &'static str,
}

/// Where the prices live and what gets exported
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLayout {
    pub prices_sheet: &'static str,
    pub export_sheet: &'static str,
    pub cells: [PriceCell; PRICE_COUNT],
    pub export_filename: &'static str,
}

/// D4..D7 in the Prices sheet
pub const PRICE_LAYOUT: PriceLayout = PriceLayout {
    prices_sheet: PRICES_SHEET,
    export_sheet: EXPORT_SHEET,
    cells: [
        PriceCell {
            cell: CellRef::new(3, 3),
            label: "Price 1",
        },
        PriceCell {
            cell: CellRef::new(4, 3),
            label: "Price 2",
        },
        PriceCell {
            cell: CellRef::new(5, 3),
            label: "Price 3",
        },
        PriceCell {
            cell: CellRef::new(6, 3),
            label: "Price 4",
        },
    ],
    export_filename: EXPORT_FILENAME,
};

impl Default for PriceLayout {
    fn default() -> Self {
        PRICE_LAYOUT
    }
}

impl PriceLayout {
    /// A1 addresses of the price cells, in form order
    pub fn addresses(&self) -> [String; PRICE_COUNT] {
        self.cells.map(|p| p.cell.a1())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_cells_are_d4_to_d7() {
        assert_eq!(
            PRICE_LAYOUT.addresses(),
            ["D4".to_string(), "D5".to_string(), "D6".to_string(), "D7".to_string()]
        );
    }

    #[test]
    fn test_layout_sheet_names() {
        let layout = PriceLayout::default();
        assert_eq!(layout.prices_sheet, "Prices");
        assert_eq!(layout.export_sheet, "Export");
        assert_eq!(layout.export_filename, "export_data.csv");
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(3), "D");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!("D4".parse::<CellRef>().unwrap(), CellRef::new(3, 3));
        assert_eq!("$D$7".parse::<CellRef>().unwrap(), CellRef::new(6, 3));
        assert_eq!("a1".parse::<CellRef>().unwrap(), CellRef::new(0, 0));
        assert_eq!("AA10".parse::<CellRef>().unwrap(), CellRef::new(9, 26));
    }

    #[test]
    fn test_parse_cell_ref_rejects_garbage() {
        assert!("".parse::<CellRef>().is_err());
        assert!("D".parse::<CellRef>().is_err());
        assert!("4".parse::<CellRef>().is_err());
        assert!("D0".parse::<CellRef>().is_err());
        assert!("D4X".parse::<CellRef>().is_err());
        assert!("1D".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_cell_ref_display_round_trips() {
        for addr in ["A1", "D4", "Z99", "AB12"] {
            let cell: CellRef = addr.parse().unwrap();
            assert_eq!(cell.to_string(), addr);
        }
    }
}
