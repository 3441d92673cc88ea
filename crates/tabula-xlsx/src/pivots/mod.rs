//! Pivot tables: creation, read-back and deletion.
//!
//! A pivot table is two parts wired into the package graph:
//!
//! * `xl/pivotCache/pivotCacheDefinition{N}.xml`: the source rectangle (or name) and one
//!   cache field per header cell. No records are written; the cache is flagged
//!   `refreshOnLoad` so the consuming application recomputes it.
//! * `xl/pivotTables/pivotTable{N}.xml`: the layout (which field sits on which axis).
//!
//! The workbook registers each cache in `<pivotCaches>`, the table points at its cache through
//! its own relationships, and the hosting worksheet points at the table.

mod cache_definition;
mod create;
mod delete;
mod extract;
mod layout;
mod registry;
mod source;
mod table_definition;
mod workbook_caches;

use tabula_model::RectangleError;
use thiserror::Error;

use crate::XlsxError;

pub use cache_definition::{
    parse_cache_definition, write_cache_definition_xml, CacheDefinition, CacheSource,
};
pub use source::ResolvedDataSource;
pub use table_definition::{
    parse_pivot_table_definition, write_pivot_table_definition_xml, ColField, DataField,
    PageField, PivotAxis, PivotFieldDef, PivotTableDefinition,
};
pub use workbook_caches::{parse_workbook_pivot_caches, WorkbookPivotCache};

/// `createdVersion` / `minRefreshableVersion` written on new parts.
pub const PIVOT_CREATED_VERSION: u32 = 3;
/// `refreshedVersion` (cache) and `updatedVersion` (table) written on new parts.
pub const PIVOT_REFRESHED_VERSION: u32 = 8;
pub const PIVOT_MIN_REFRESHABLE_VERSION: u32 = 3;
/// Caption of the synthetic values field.
pub const PIVOT_DATA_CAPTION: &str = "Values";

const PIVOT_TABLE_DIR: &str = "xl/pivotTables/";
const PIVOT_TABLE_PREFIX: &str = "pivotTable";
const PIVOT_CACHE_DIR: &str = "xl/pivotCache/";
const PIVOT_CACHE_PREFIX: &str = "pivotCacheDefinition";

pub(crate) fn pivot_table_part_name(ordinal: u32) -> String {
    format!("{PIVOT_TABLE_DIR}{PIVOT_TABLE_PREFIX}{ordinal}.xml")
}

pub(crate) fn pivot_cache_part_name(ordinal: u32) -> String {
    format!("{PIVOT_CACHE_DIR}{PIVOT_CACHE_PREFIX}{ordinal}.xml")
}

#[derive(Debug, Error)]
pub enum PivotTableError {
    #[error("parameter {0} is required")]
    RequiredParameter(&'static str),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("invalid pivot table data range: {0}")]
    InvalidDataRange(String),
    #[error("invalid pivot table range: {0}")]
    InvalidTableRange(String),
    #[error("pivot table name exceeds the maximum length")]
    NameTooLong,
    #[error("sheet {0} does not exist")]
    SheetNotFound(String),
    #[error("pivot table {0} does not exist")]
    TableNotFound(String),
    #[error(transparent)]
    Xlsx(#[from] XlsxError),
}

impl PivotTableError {
    pub(crate) fn data_range(err: RectangleError) -> Self {
        PivotTableError::InvalidDataRange(err.to_string())
    }

    pub(crate) fn table_range(err: RectangleError) -> Self {
        PivotTableError::InvalidTableRange(err.to_string())
    }
}
