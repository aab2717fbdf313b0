//! A1-style cell and range references.
//!
//! Accepts the forms a spreadsheet host reports for a selection or a model
//! writes into an action: `A1`, `$B$2`, `A1:C5`, whole columns `A:C`, whole
//! rows `1:3`, and any of those qualified by a sheet, `Sheet1!A1` or
//! `'Q3 Sales'!A1:B2`. Rows and columns are stored 0-based.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rows per sheet (1..=1048576 in display form).
pub const MAX_ROWS: u32 = 1_048_576;
/// Columns per sheet (A..=XFD).
pub const MAX_COLS: u32 = 16_384;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("empty address")]
    Empty,
    #[error("invalid address '{0}'")]
    Invalid(String),
    #[error("address '{0}' is outside the sheet")]
    OutOfBounds(String),
}

/// A single cell, 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

/// A rectangular range, optionally qualified by a sheet name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeRef {
    pub sheet: Option<String>,
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    pub fn new(start: CellRef, end: CellRef) -> Self {
        Self {
            sheet: None,
            start: CellRef::new(start.row.min(end.row), start.col.min(end.col)),
            end: CellRef::new(start.row.max(end.row), start.col.max(end.col)),
        }
    }

    pub fn single(cell: CellRef) -> Self {
        Self::new(cell, cell)
    }

    /// Parse an A1-style reference.
    ///
    /// ```
    /// use sheet_sense::address::RangeRef;
    ///
    /// let r = RangeRef::parse("'Q3 Sales'!$B$2:C4").unwrap();
    /// assert_eq!(r.sheet.as_deref(), Some("Q3 Sales"));
    /// assert_eq!((r.row_count(), r.col_count()), (3, 2));
    /// ```
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AddressError::Empty);
        }

        let (sheet, body) = match s.rsplit_once('!') {
            Some((sheet, body)) => (Some(parse_sheet_name(sheet, s)?), body),
            None => (None, s),
        };

        let mut range = match body.split_once(':') {
            None => {
                let cell = match parse_endpoint(body, s)? {
                    Endpoint::Cell(cell) => cell,
                    _ => return Err(AddressError::Invalid(s.to_string())),
                };
                RangeRef::single(cell)
            }
            Some((a, b)) => match (parse_endpoint(a, s)?, parse_endpoint(b, s)?) {
                (Endpoint::Cell(a), Endpoint::Cell(b)) => RangeRef::new(a, b),
                (Endpoint::Column(a), Endpoint::Column(b)) => RangeRef::new(
                    CellRef::new(0, a),
                    CellRef::new(MAX_ROWS - 1, b),
                ),
                (Endpoint::Row(a), Endpoint::Row(b)) => RangeRef::new(
                    CellRef::new(a, 0),
                    CellRef::new(b, MAX_COLS - 1),
                ),
                _ => return Err(AddressError::Invalid(s.to_string())),
            },
        };
        range.sheet = sheet;
        Ok(range)
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    pub fn col_count(&self) -> u32 {
        self.end.col - self.start.col + 1
    }

    pub fn cell_count(&self) -> u64 {
        u64::from(self.row_count()) * u64::from(self.col_count())
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    /// Overlap test on coordinates only; sheet qualifiers are ignored.
    pub fn overlaps(&self, other: &RangeRef) -> bool {
        self.start.row <= other.end.row
            && self.end.row >= other.start.row
            && self.start.col <= other.end.col
            && self.end.col >= other.start.col
    }

    /// A `rows` x `cols` range anchored at this range's top-left cell.
    pub fn anchored(&self, rows: u32, cols: u32) -> Result<RangeRef, AddressError> {
        let end_row = self.start.row + rows.max(1) - 1;
        let end_col = self.start.col + cols.max(1) - 1;
        if end_row >= MAX_ROWS || end_col >= MAX_COLS {
            return Err(AddressError::OutOfBounds(self.to_string()));
        }
        Ok(RangeRef {
            sheet: self.sheet.clone(),
            start: self.start,
            end: CellRef::new(end_row, end_col),
        })
    }

    /// Iterate cells row by row.
    pub fn cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        (self.start.row..=self.end.row)
            .flat_map(move |row| (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col)))
    }

    /// Column indices spanned by this range.
    pub fn columns(&self) -> std::ops::RangeInclusive<u32> {
        self.start.col..=self.end.col
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            if needs_quotes(sheet) {
                write!(f, "'{}'!", sheet.replace('\'', "''"))?;
            } else {
                write!(f, "{sheet}!")?;
            }
        }
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for RangeRef {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

enum Endpoint {
    Cell(CellRef),
    Column(u32),
    Row(u32),
}

fn parse_endpoint(part: &str, whole: &str) -> Result<Endpoint, AddressError> {
    let invalid = || AddressError::Invalid(whole.to_string());
    let part = part.trim();
    let part = part.strip_prefix('$').unwrap_or(part);

    let letters_len = part.chars().take_while(char::is_ascii_alphabetic).count();
    let (letters, rest) = part.split_at(letters_len);
    let digits = rest.strip_prefix('$').unwrap_or(rest);

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let col = if letters.is_empty() {
        None
    } else {
        Some(letters_to_column(letters).ok_or_else(invalid)?)
    };
    let row = if digits.is_empty() {
        None
    } else {
        let n: u32 = digits.parse().map_err(|_| invalid())?;
        if n == 0 {
            return Err(invalid());
        }
        Some(n - 1)
    };

    if col.is_some_and(|c| c >= MAX_COLS) || row.is_some_and(|r| r >= MAX_ROWS) {
        return Err(AddressError::OutOfBounds(whole.to_string()));
    }

    match (col, row) {
        (Some(col), Some(row)) => Ok(Endpoint::Cell(CellRef::new(row, col))),
        (Some(col), None) if rest.is_empty() => Ok(Endpoint::Column(col)),
        (None, Some(row)) => Ok(Endpoint::Row(row)),
        _ => Err(invalid()),
    }
}

fn parse_sheet_name(raw: &str, whole: &str) -> Result<String, AddressError> {
    let raw = raw.trim();
    let name = match raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')) {
        Some(inner) => inner.replace("''", "'"),
        None => raw.to_string(),
    };
    if name.is_empty() {
        return Err(AddressError::Invalid(whole.to_string()));
    }
    Ok(name)
}

fn needs_quotes(sheet: &str) -> bool {
    !sheet.chars().all(|c| c.is_alphanumeric() || c == '_')
        || sheet.chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Column letters to a 0-based index (`A` = 0, `AA` = 26). `None` on overflow
/// or non-letters.
pub fn letters_to_column(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_uppercase()) - u32::from('A') + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
    }
    Some(col - 1)
}

/// 0-based column index to letters (`0` = `A`, `26` = `AA`).
pub fn column_letters(col: u32) -> String {
    let mut n = col + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push(char::from_u32(u32::from('A') + rem).unwrap_or('A'));
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}
