//! `tabula-model` defines the format-agnostic types shared by the Tabula spreadsheet crates.
//!
//! - A1 cell/range geometry and sheet-qualified rectangles ([`SheetRect`], [`normalize_rectangle`])
//! - sheet-name comparison and quoting helpers
//! - pivot table options ([`pivots::PivotTableOptions`]) consumed and produced by `tabula-xlsx`

mod address;
pub mod pivots;
mod sheet_name;

pub use address::{
    normalize_rectangle, A1ParseError, CellRef, Range, RangeParseError, RectangleError,
    SheetRect, EXCEL_MAX_COLS, EXCEL_MAX_ROWS,
};
pub use sheet_name::{
    format_sheet_name, sheet_name_casefold, sheet_name_eq_case_insensitive, unquote_sheet_name,
};
