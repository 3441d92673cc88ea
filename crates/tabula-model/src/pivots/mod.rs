//! Options describing a worksheet pivot table.
//!
//! [`PivotTableOptions`] is both the input of pivot creation and the value reconstructed when
//! reading pivot tables back from a workbook. Field lists reference source columns by their
//! header text; the XLSX layer resolves those names to field indices.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

mod style;

pub use style::{
    builtin_pivot_style_names, is_builtin_pivot_style, PivotStyleFamily,
    DEFAULT_PIVOT_STYLE_NAME,
};

/// Longest display name (in characters) stored for a pivot field.
pub const MAX_FIELD_LENGTH: usize = 255;

/// Aggregation applied to a pivot data field.
///
/// Serialized in its XML spelling. Deserialization is lenient: names match case-insensitively
/// and unknown names become [`SubtotalFunction::Sum`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SubtotalFunction {
    Average,
    Count,
    CountNums,
    Max,
    Min,
    Product,
    StdDev,
    StdDevp,
    #[default]
    Sum,
    Var,
    Varp,
}

impl SubtotalFunction {
    pub const ALL: [SubtotalFunction; 11] = [
        SubtotalFunction::Average,
        SubtotalFunction::Count,
        SubtotalFunction::CountNums,
        SubtotalFunction::Max,
        SubtotalFunction::Min,
        SubtotalFunction::Product,
        SubtotalFunction::StdDev,
        SubtotalFunction::StdDevp,
        SubtotalFunction::Sum,
        SubtotalFunction::Var,
        SubtotalFunction::Varp,
    ];

    /// SpreadsheetML spelling (`ST_DataConsolidateFunction`), e.g. `countNums`.
    pub const fn xml_name(self) -> &'static str {
        match self {
            SubtotalFunction::Average => "average",
            SubtotalFunction::Count => "count",
            SubtotalFunction::CountNums => "countNums",
            SubtotalFunction::Max => "max",
            SubtotalFunction::Min => "min",
            SubtotalFunction::Product => "product",
            SubtotalFunction::StdDev => "stdDev",
            SubtotalFunction::StdDevp => "stdDevp",
            SubtotalFunction::Sum => "sum",
            SubtotalFunction::Var => "var",
            SubtotalFunction::Varp => "varp",
        }
    }

    /// Title-case spelling used for display, e.g. `Sum` or `CountNums`.
    pub const fn title(self) -> &'static str {
        match self {
            SubtotalFunction::Average => "Average",
            SubtotalFunction::Count => "Count",
            SubtotalFunction::CountNums => "CountNums",
            SubtotalFunction::Max => "Max",
            SubtotalFunction::Min => "Min",
            SubtotalFunction::Product => "Product",
            SubtotalFunction::StdDev => "StdDev",
            SubtotalFunction::StdDevp => "StdDevp",
            SubtotalFunction::Sum => "Sum",
            SubtotalFunction::Var => "Var",
            SubtotalFunction::Varp => "Varp",
        }
    }

    /// Case-insensitive lookup by name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.xml_name().eq_ignore_ascii_case(name))
    }

    /// Like [`SubtotalFunction::from_name`], but unknown names fall back to [`SubtotalFunction::Sum`].
    pub fn from_name_or_sum(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }
}

impl<'de> Deserialize<'de> for SubtotalFunction {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name_or_sum(&name))
    }
}

impl fmt::Display for SubtotalFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// One field placed on a pivot axis (rows, columns, filter or values).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotTableField {
    /// Header text of the source column.
    pub data: String,
    /// Display name. Longer names are truncated to [`MAX_FIELD_LENGTH`] characters when written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Aggregation for value fields. `None` means sum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<SubtotalFunction>,
    pub compact: bool,
    pub outline: bool,
    /// Emit an automatic subtotal item for row/column fields.
    pub default_subtotal: bool,
}

impl PivotTableField {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_subtotal(mut self, subtotal: SubtotalFunction) -> Self {
        self.subtotal = Some(subtotal);
        self
    }

    pub fn with_default_subtotal(mut self, default_subtotal: bool) -> Self {
        self.default_subtotal = default_subtotal;
        self
    }

    /// Display name truncated to [`MAX_FIELD_LENGTH`] characters.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().map(truncate_field_name)
    }

    /// Effective aggregation for a value field.
    pub fn subtotal_or_default(&self) -> SubtotalFunction {
        self.subtotal.unwrap_or_default()
    }
}

/// Everything needed to create a pivot table, or what was read back from an existing one.
///
/// The boolean flags map one-to-one onto `pivotTableDefinition` and `pivotTableStyleInfo`
/// attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PivotTableOptions {
    /// `Sheet!A1:E31`, a table name, or a defined name.
    pub data_range: String,
    /// `Sheet!G2:M34`: where the pivot table is placed.
    pub pivot_table_range: String,
    /// Table name. Empty means `PivotTable{N}`.
    pub name: String,
    pub rows: Vec<PivotTableField>,
    pub columns: Vec<PivotTableField>,
    pub data: Vec<PivotTableField>,
    pub filter: Vec<PivotTableField>,
    pub row_grand_totals: bool,
    pub col_grand_totals: bool,
    pub show_drill: bool,
    pub use_auto_formatting: bool,
    pub page_over_then_down: bool,
    pub merge_item: bool,
    pub compact_data: bool,
    pub show_error: bool,
    pub show_row_headers: bool,
    pub show_col_headers: bool,
    pub show_row_stripes: bool,
    pub show_col_stripes: bool,
    pub show_last_column: bool,
    /// Table style. `None` means [`DEFAULT_PIVOT_STYLE_NAME`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
}

impl PivotTableOptions {
    pub fn style_name_or_default(&self) -> &str {
        match self.style_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_PIVOT_STYLE_NAME,
        }
    }
}

/// Truncate a field display name to at most [`MAX_FIELD_LENGTH`] characters.
pub fn truncate_field_name(name: &str) -> &str {
    match name.char_indices().nth(MAX_FIELD_LENGTH) {
        Some((byte_idx, _)) => &name[..byte_idx],
        None => name,
    }
}

#[cfg(test)]
mod tests;
