//! XLSX package access and pivot table authoring.
//!
//! - [`XlsxPackage`]: the Open Packaging Convention ZIP held in memory as part name -> bytes.
//!   Parts the crate does not understand are preserved byte-for-byte.
//! - [`pivots`]: add, read back and delete pivot tables together with their pivot caches.
//! - [`minimal`]: a builder for small workbooks with data, tables and defined names.
//!
//! The module surface also exposes the focused parsers the pivot code is built on (shared
//! strings, tables, defined names and relationships).

mod content_types;
pub mod defined_names;
mod edits;
pub mod minimal;
pub mod openxml;
mod package;
pub mod pivots;
mod relationships;
pub mod shared_strings;
mod sheet_metadata;
pub mod tables;
mod worksheet;
mod zip_util;

pub use content_types::{
    ensure_content_types_override, PIVOT_CACHE_DEFINITION_CONTENT_TYPE, PIVOT_TABLE_CONTENT_TYPE,
};
pub use minimal::{MinimalCell, MinimalWorkbook};
pub use package::{WorksheetPartInfo, XlsxError, XlsxPackage, XlsxPackageLimits};
pub use pivots::PivotTableError;
pub use relationships::Relationships;
pub use sheet_metadata::{SheetVisibility, WorkbookSheetInfo};
pub use worksheet::read_cell_text_in_range;

pub use tabula_model::pivots::{PivotTableField, PivotTableOptions, SubtotalFunction};
