use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sheet_name::{format_sheet_name, unquote_sheet_name};

/// Rows in a worksheet (`1..=1_048_576` in A1 notation).
pub const EXCEL_MAX_ROWS: u32 = 1_048_576;
/// Columns in a worksheet (`A..=XFD`).
pub const EXCEL_MAX_COLS: u32 = 16_384;

/// A single cell, 0-indexed: `CellRef { row: 0, col: 0 }` is `A1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    #[inline]
    pub const fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1 spelling, e.g. `BC32`.
    pub fn to_a1(self) -> String {
        self.to_string()
    }

    /// Parse `A1`, `$B$2` or `bc32`.
    pub fn from_a1(a1: &str) -> Result<Self, A1ParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }

        let s = s.strip_prefix('$').unwrap_or(s);
        let letters_end = s
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(s.len());
        let (letters, rest) = s.split_at(letters_end);
        if letters.is_empty() {
            return Err(A1ParseError::MissingColumn);
        }
        let digits = rest.strip_prefix('$').unwrap_or(rest);
        if digits.is_empty() {
            return Err(A1ParseError::MissingRow);
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(A1ParseError::TrailingCharacters);
        }

        let col = column_index(letters).ok_or(A1ParseError::InvalidColumn)?;
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|row| (1..=EXCEL_MAX_ROWS).contains(row))
            .ok_or(A1ParseError::InvalidRow)?;
        Ok(Self::new(row - 1, col))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

/// An inclusive rectangle of cells with `start` top-left and `end` bottom-right.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: CellRef,
    pub end: CellRef,
}

impl Range {
    /// The rectangle spanned by two opposite corners, given in any order.
    pub fn new(a: CellRef, b: CellRef) -> Self {
        Self {
            start: CellRef::new(a.row.min(b.row), a.col.min(b.col)),
            end: CellRef::new(a.row.max(b.row), a.col.max(b.col)),
        }
    }

    pub fn contains(&self, cell: CellRef) -> bool {
        (self.start.row..=self.end.row).contains(&cell.row)
            && (self.start.col..=self.end.col).contains(&cell.col)
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    /// Cells of the first row, left to right.
    pub fn header_cells(&self) -> impl Iterator<Item = CellRef> + '_ {
        let row = self.start.row;
        (self.start.col..=self.end.col).map(move |col| CellRef::new(row, col))
    }

    /// Parse `A1:B2`, or a lone cell such as `C3`.
    pub fn from_a1(a1: &str) -> Result<Self, RangeParseError> {
        let s = a1.trim();
        if s.is_empty() {
            return Err(RangeParseError::Empty);
        }
        let (first, second) = s.split_once(':').unwrap_or((s, s));
        Ok(Range::new(CellRef::from_a1(first)?, CellRef::from_a1(second)?))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)?;
        if !self.is_single_cell() {
            write!(f, ":{}", self.end)?;
        }
        Ok(())
    }
}

/// A sheet-qualified rectangle with at least two cells, e.g. `Sheet1!A1:E31`.
///
/// Values are produced by [`normalize_rectangle`], so `range` is always top-left/bottom-right.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SheetRect {
    pub sheet: String,
    pub range: Range,
}

impl fmt::Display for SheetRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", format_sheet_name(&self.sheet), self.range)
    }
}

impl std::str::FromStr for SheetRect {
    type Err = RectangleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_rectangle(s)
    }
}

/// Errors returned by [`normalize_rectangle`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RectangleError {
    #[error("reference {0:?} must contain exactly one `!` between sheet and cells")]
    Separator(String),
    #[error("reference {0:?} has an empty sheet name")]
    EmptySheet(String),
    #[error("reference {reference:?} has invalid coordinates: {source}")]
    Coordinates {
        reference: String,
        #[source]
        source: RangeParseError,
    },
    #[error("reference {0:?} is a single cell, a range of at least two cells is required")]
    SingleCell(String),
}

/// Parse a `Sheet!A1:B2` reference into a normalized [`SheetRect`].
///
/// `$` anchors are ignored and the corners may be given in any order. A quoted sheet name
/// (`'My Sheet'!A1:B2`) is unquoted. A single cell (`A1` or `A1:A1`) is rejected.
pub fn normalize_rectangle(reference: &str) -> Result<SheetRect, RectangleError> {
    let reference = reference.trim();
    let (sheet, cells) = split_sheet_qualified(reference)
        .ok_or_else(|| RectangleError::Separator(reference.to_string()))?;
    if sheet.is_empty() {
        return Err(RectangleError::EmptySheet(reference.to_string()));
    }

    let cells = cells.replace('$', "");
    let range = Range::from_a1(&cells).map_err(|source| RectangleError::Coordinates {
        reference: reference.to_string(),
        source,
    })?;
    if range.is_single_cell() {
        return Err(RectangleError::SingleCell(reference.to_string()));
    }

    Ok(SheetRect { sheet, range })
}

/// Split `Sheet!cells` on its single separator.
///
/// A quoted sheet name may itself contain `!`; the separator is then the one following the
/// closing quote.
fn split_sheet_qualified(reference: &str) -> Option<(String, &str)> {
    if reference.starts_with('\'') {
        let bytes = reference.as_bytes();
        let mut idx = 1usize;
        while idx < bytes.len() {
            if bytes[idx] == b'\'' {
                if bytes.get(idx + 1) == Some(&b'\'') {
                    idx += 2;
                    continue;
                }
                break;
            }
            idx += 1;
        }
        let (quoted, rest) = reference.split_at((idx + 1).min(reference.len()));
        let cells = rest.strip_prefix('!')?;
        if cells.contains('!') {
            return None;
        }
        return Some((unquote_sheet_name(quoted), cells));
    }

    let mut parts = reference.split('!');
    let sheet = parts.next()?;
    let cells = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((sheet.to_string(), cells))
}

/// Why an A1 cell reference failed to parse.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
pub enum A1ParseError {
    #[error("empty A1 reference")]
    Empty,
    #[error("missing column in A1 reference")]
    MissingColumn,
    #[error("missing row in A1 reference")]
    MissingRow,
    #[error("invalid column in A1 reference")]
    InvalidColumn,
    #[error("invalid row in A1 reference")]
    InvalidRow,
    #[error("trailing characters in A1 reference")]
    TrailingCharacters,
}

/// Why an A1 range failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("empty A1 range")]
    Empty,
    #[error("invalid cell reference in range: {0}")]
    Cell(#[from] A1ParseError),
}

/// Bijective base-26 column letters for a 0-based column index.
fn column_letters(col: u32) -> String {
    let mut letters = Vec::new();
    let mut n = col + 1;
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

/// 0-based column index for `letters`, or `None` past `XFD`.
fn column_index(letters: &str) -> Option<u32> {
    let col = letters.bytes().try_fold(0u32, |acc, b| {
        let digit = u32::from(b.to_ascii_uppercase().checked_sub(b'A')?) + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })?;
    (1..=EXCEL_MAX_COLS).contains(&col).then(|| col - 1)
}
