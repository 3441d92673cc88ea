use std::collections::BTreeMap;

use tabula_model::normalize_rectangle;
use tabula_model::pivots::PivotTableOptions;

use crate::content_types::{
    ensure_content_types_override, PIVOT_CACHE_DEFINITION_CONTENT_TYPE, PIVOT_TABLE_CONTENT_TYPE,
};
use crate::openxml::{rel_types, relative_target};
use crate::package::{CONTENT_TYPES_PART, WORKBOOK_PART};
use crate::{XlsxError, XlsxPackage};

use super::cache_definition::{write_cache_definition_xml, CacheSource};
use super::layout::{build_table_definition, check_table_name};
use super::registry::{add_relationship, next_pivot_cache_ordinal, next_pivot_table_ordinal};
use super::source::{field_order, resolve_data_source};
use super::table_definition::write_pivot_table_definition_xml;
use super::workbook_caches::add_workbook_pivot_cache;
use super::{pivot_cache_part_name, pivot_table_part_name, PivotTableError};

impl XlsxPackage {
    /// Add a pivot table described by `options`.
    ///
    /// Creates a fresh pivot cache over the data range and a pivot table definition at
    /// `options.pivot_table_range`, then wires both into the workbook, the hosting worksheet and
    /// `[Content_Types].xml`. The cache holds no records and is refreshed when the workbook is
    /// opened.
    ///
    /// Either every part is updated or, on error, none is.
    pub fn add_pivot_table(&mut self, options: &PivotTableOptions) -> Result<(), PivotTableError> {
        let staged = stage_pivot_table(self, options)?;
        self.apply_edits(staged);
        Ok(())
    }
}

fn stage_pivot_table(
    package: &XlsxPackage,
    options: &PivotTableOptions,
) -> Result<BTreeMap<String, Vec<u8>>, PivotTableError> {
    if options.pivot_table_range.trim().is_empty() {
        return Err(PivotTableError::RequiredParameter("PivotTableRange"));
    }
    let target =
        normalize_rectangle(&options.pivot_table_range).map_err(PivotTableError::table_range)?;
    check_table_name(&options.name)?;

    let source = resolve_data_source(package, &options.data_range, Some(&target.sheet))?;
    let pivot_sheet_part = package
        .worksheet_part(&target.sheet)?
        .ok_or_else(|| PivotTableError::SheetNotFound(target.sheet.clone()))?;
    let order = field_order(package, &source)?;

    let mut edits = package.begin_edits();
    let table_ordinal = next_pivot_table_ordinal(&edits);
    let cache_ordinal = next_pivot_cache_ordinal(&edits);
    let table_part = pivot_table_part_name(table_ordinal);
    let cache_part = pivot_cache_part_name(cache_ordinal);
    log::debug!(
        "adding pivot table {table_part} with cache {cache_part} over {}",
        source.reference
    );

    let cache_source = match &source.name {
        Some(name) => CacheSource::Named(name.clone()),
        None => CacheSource::Worksheet(source.reference.clone()),
    };
    edits.set_part(
        &cache_part,
        write_cache_definition_xml(&cache_source, &order)?.into_bytes(),
    );

    let workbook_rel_id = add_relationship(
        &mut edits,
        WORKBOOK_PART,
        rel_types::PIVOT_CACHE_DEFINITION,
        &relative_target(WORKBOOK_PART, &cache_part),
    )?;
    let workbook_xml = edits
        .part(WORKBOOK_PART)
        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
    let (workbook_xml, cache_id) = add_workbook_pivot_cache(workbook_xml, &workbook_rel_id)?;
    edits.set_part(WORKBOOK_PART, workbook_xml);

    add_relationship(
        &mut edits,
        &table_part,
        rel_types::PIVOT_CACHE_DEFINITION,
        &relative_target(&table_part, &cache_part),
    )?;

    let name = if options.name.is_empty() {
        format!("PivotTable{table_ordinal}")
    } else {
        options.name.clone()
    };
    let definition = build_table_definition(options, &order, name, cache_id, target.range)?;
    edits.set_part(&table_part, write_pivot_table_definition_xml(&definition)?);

    add_relationship(
        &mut edits,
        &pivot_sheet_part,
        rel_types::PIVOT_TABLE,
        &relative_target(&pivot_sheet_part, &table_part),
    )?;

    for (part, content_type) in [
        (&table_part, PIVOT_TABLE_CONTENT_TYPE),
        (&cache_part, PIVOT_CACHE_DEFINITION_CONTENT_TYPE),
    ] {
        let content_types =
            ensure_content_types_override(edits.part(CONTENT_TYPES_PART), part, content_type)?;
        edits.set_part(CONTENT_TYPES_PART, content_types);
    }

    Ok(edits.into_staged())
}
