//! A1-style cell references.
//!
//! Worksheet features that target cells (merges, validations, tables,
//! images, auto-filters) are validated here before anything reaches the
//! output, so a malformed reference can never corrupt already-flushed bytes.

use crate::common::error::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Maximum number of rows in a worksheet.
pub const MAX_ROWS: u32 = 1_048_576;
/// Maximum number of columns in a worksheet.
pub const MAX_COLUMNS: u32 = 16_384;

/// Convert a 1-based column number to letters (1 -> "A", 27 -> "AA").
pub fn column_to_letters(col: u32) -> String {
    let mut letters = String::new();
    let mut col = col;

    while col > 0 {
        col -= 1;
        let letter = ((col % 26) as u8 + b'A') as char;
        letters.insert(0, letter);
        col /= 26;
    }

    letters
}

/// Convert column letters to a 1-based column number.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut col = 0u32;
    for b in letters.bytes() {
        if !b.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1);
    }

    (col <= MAX_COLUMNS).then_some(col)
}

/// A single cell position, both coordinates 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRef {
    pub column: u32,
    pub row: u32,
}

impl CellRef {
    /// Create a reference, checking the worksheet bounds.
    pub fn new(column: u32, row: u32) -> Result<Self> {
        if column == 0 || column > MAX_COLUMNS {
            return Err(Error::invalid_argument(format!(
                "Column {} is outside 1..={}",
                column, MAX_COLUMNS
            )));
        }
        if row == 0 || row > MAX_ROWS {
            return Err(Error::invalid_argument(format!(
                "Row {} is outside 1..={}",
                row, MAX_ROWS
            )));
        }
        Ok(Self { column, row })
    }
}

impl FromStr for CellRef {
    type Err = Error;

    /// Parse `B7` or `$B$7`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid_argument(format!("Invalid cell reference: '{}'", s));

        let body = s.strip_prefix('$').unwrap_or(s);
        let split = body
            .find(|c: char| !c.is_ascii_alphabetic())
            .ok_or_else(invalid)?;
        let (letters, rest) = body.split_at(split);
        let digits = rest.strip_prefix('$').unwrap_or(rest);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || digits.starts_with('0')
        {
            return Err(invalid());
        }

        let column = letters_to_column(letters).ok_or_else(invalid)?;
        let row: u32 = digits.parse().map_err(|_| invalid())?;
        CellRef::new(column, row).map_err(|_| invalid())
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.column), self.row)
    }
}

/// A rectangular range with `first` at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub first: CellRef,
    pub last: CellRef,
}

impl CellRange {
    /// Create a range from two corners in any order.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            first: CellRef {
                column: a.column.min(b.column),
                row: a.row.min(b.row),
            },
            last: CellRef {
                column: a.column.max(b.column),
                row: a.row.max(b.row),
            },
        }
    }

    #[inline]
    pub fn column_count(&self) -> u32 {
        self.last.column - self.first.column + 1
    }

    #[inline]
    pub fn row_count(&self) -> u32 {
        self.last.row - self.first.row + 1
    }

    /// Whether two ranges share at least one cell.
    pub fn overlaps(&self, other: &CellRange) -> bool {
        self.first.column <= other.last.column
            && other.first.column <= self.last.column
            && self.first.row <= other.last.row
            && other.first.row <= self.last.row
    }
}

impl FromStr for CellRange {
    type Err = Error;

    /// Parse `A1:B2`, or a single cell `A1` as a one-cell range.
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((a, b)) => Ok(CellRange::new(a.parse()?, b.parse()?)),
            None => {
                let cell: CellRef = s.parse()?;
                Ok(CellRange::new(cell, cell))
            },
        }
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

/// Parse a space-separated list of ranges (the `sqref` form).
pub fn parse_sqref(s: &str) -> Result<Vec<CellRange>> {
    let ranges = s
        .split(' ')
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect::<Result<Vec<CellRange>>>()?;

    if ranges.is_empty() {
        return Err(Error::invalid_argument("Empty cell reference"));
    }
    Ok(ranges)
}

/// Whether `name` would be read as a cell reference in A1 or R1C1 style.
pub fn looks_like_cell_reference(name: &str) -> bool {
    if name.parse::<CellRef>().is_ok() {
        return true;
    }

    let upper = name.to_ascii_uppercase();
    if upper == "R" || upper == "C" {
        return true;
    }

    // R1C1, R1, C1 and friends
    let rest = match upper.strip_prefix('R') {
        Some(rest) => rest.trim_start_matches(|c: char| c.is_ascii_digit()),
        None => upper.as_str(),
    };
    let rest = match rest.strip_prefix('C') {
        Some(rest) => rest.trim_start_matches(|c: char| c.is_ascii_digit()),
        None => rest,
    };
    rest.is_empty() && upper.len() > 1
}
