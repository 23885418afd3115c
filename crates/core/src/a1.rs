//! A1 notation: "B7" cells and "A4:Q4" ranges, converted to zero-based grid
//! coordinates.

use crate::error::SheetError;

/// Zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    /// Parses "A1"-style notation.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidRange`] for malformed input.
    pub fn parse(cell: &str) -> Result<Self, SheetError> {
        let cell = cell.trim();
        let split = cell
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| SheetError::InvalidRange(cell.to_string()))?;
        let (letters, digits) = cell.split_at(split);

        if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SheetError::InvalidRange(cell.to_string()));
        }
        let row: u32 = digits
            .parse()
            .map_err(|_| SheetError::InvalidRange(cell.to_string()))?;
        if row == 0 {
            return Err(SheetError::InvalidRange(cell.to_string()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            let value = u32::from(c.to_ascii_uppercase() as u8 - b'A') + 1;
            col = col
                .checked_mul(26)
                .and_then(|v| v.checked_add(value))
                .ok_or_else(|| SheetError::InvalidRange(cell.to_string()))?;
        }

        Ok(Self { row: row - 1, col: col - 1 })
    }

    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Back to A1 notation.
    #[must_use]
    pub fn to_a1(self) -> String {
        format!("{}{}", column_letters(self.col), self.row + 1)
    }
}

/// Half-open zero-based range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub start_row: u32,
    pub end_row: u32,
    pub start_col: u32,
    pub end_col: u32,
}

impl GridRange {
    /// Parses "A1" or "A4:Q4".
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidRange`] for malformed or inverted input.
    pub fn parse(range: &str) -> Result<Self, SheetError> {
        let (start, end) = match range.split_once(':') {
            Some((a, b)) => (CellRef::parse(a)?, CellRef::parse(b)?),
            None => {
                let cell = CellRef::parse(range)?;
                (cell, cell)
            }
        };
        if end.row < start.row || end.col < start.col {
            return Err(SheetError::InvalidRange(range.to_string()));
        }
        Ok(Self {
            start_row: start.row,
            end_row: end.row + 1,
            start_col: start.col,
            end_col: end.col + 1,
        })
    }

    /// Range covering a block of `rows × cols` anchored at `anchor`.
    #[must_use]
    pub fn block(anchor: CellRef, rows: u32, cols: u32) -> Self {
        Self {
            start_row: anchor.row,
            end_row: anchor.row + rows.max(1),
            start_col: anchor.col,
            end_col: anchor.col + cols.max(1),
        }
    }

    #[must_use]
    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start_row..self.end_row).contains(&cell.row)
            && (self.start_col..self.end_col).contains(&cell.col)
    }
}

/// Zero-based column index to letters: 0 → "A", 26 → "AA".
#[must_use]
pub fn column_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        out.push((b'A' + rem) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}
