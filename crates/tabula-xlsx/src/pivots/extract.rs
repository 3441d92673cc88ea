use tabula_model::pivots::{PivotTableField, PivotTableOptions};
use tabula_model::{sheet_name_eq_case_insensitive, SheetRect};

use crate::{WorksheetPartInfo, XlsxError, XlsxPackage};

use super::cache_definition::{parse_cache_definition, CacheSource};
use super::registry::{worksheet_pivot_links, PivotTableLink};
use super::source::{field_order, resolve_data_source};
use super::table_definition::{
    apply_flags, parse_pivot_table_definition, PivotAxis, FIELD_FLAGS, STYLE_FLAGS, TABLE_FLAGS,
};
use super::PivotTableError;

impl XlsxPackage {
    /// The pivot tables hosted on `sheet`, in relationship order.
    ///
    /// Field lists are rebuilt against the current header row of the data range, so headers
    /// edited since the table was created show up under their new text. Boolean options absent
    /// from the XML take their schema defaults, and the style name is always filled in.
    pub fn pivot_tables(&self, sheet: &str) -> Result<Vec<PivotTableOptions>, PivotTableError> {
        let info = find_worksheet(self, sheet)?;
        worksheet_pivot_links(self, &info.worksheet_part)?
            .iter()
            .map(|link| extract_pivot_table(self, &info.name, link))
            .collect()
    }
}

pub(crate) fn find_worksheet(
    package: &XlsxPackage,
    sheet: &str,
) -> Result<WorksheetPartInfo, PivotTableError> {
    package
        .worksheet_parts()?
        .into_iter()
        .find(|info| sheet_name_eq_case_insensitive(&info.name, sheet))
        .ok_or_else(|| PivotTableError::SheetNotFound(sheet.to_string()))
}

fn extract_pivot_table(
    package: &XlsxPackage,
    sheet_name: &str,
    link: &PivotTableLink,
) -> Result<PivotTableOptions, PivotTableError> {
    let table_xml = package
        .part(&link.table_part)
        .ok_or_else(|| XlsxError::MissingPart(link.table_part.clone()))?;
    let definition = parse_pivot_table_definition(table_xml)?;

    let cache_part = link.cache_part.as_deref().ok_or_else(|| {
        XlsxError::Invalid(format!("{} has no pivot cache", link.table_part))
    })?;
    let cache_xml = package
        .part(cache_part)
        .ok_or_else(|| XlsxError::MissingPart(cache_part.to_string()))?;
    let cache_xml = std::str::from_utf8(cache_xml).map_err(XlsxError::from)?;
    let cache = parse_cache_definition(cache_xml)?;

    let data_range = match cache.source {
        CacheSource::Worksheet(rect) => rect.to_string(),
        CacheSource::Named(name) => name,
    };
    let source = resolve_data_source(package, &data_range, Some(sheet_name))?;

    let mut options = PivotTableOptions {
        data_range,
        pivot_table_range: SheetRect {
            sheet: sheet_name.to_string(),
            range: definition.location,
        }
        .to_string(),
        name: definition.name.clone(),
        style_name: definition.style_name.clone(),
        ..PivotTableOptions::default()
    };
    apply_flags(TABLE_FLAGS, &definition.flags, &mut options);
    apply_flags(STYLE_FLAGS, &definition.style_flags, &mut options);

    let order = field_order(package, &source)?;

    for (idx, field) in definition.pivot_fields.iter().enumerate() {
        let axis = match field.axis {
            Some(PivotAxis::Row) => &mut options.rows,
            Some(PivotAxis::Column) => &mut options.columns,
            Some(PivotAxis::Page) => &mut options.filter,
            Some(PivotAxis::Values) | None => continue,
        };
        let Some(header) = order.get(idx) else {
            log::warn!(
                "{}: pivot field {idx} is beyond the {} columns of {}",
                link.table_part,
                order.len(),
                source.reference
            );
            continue;
        };
        let mut extracted = PivotTableField {
            data: header.clone(),
            name: field.name.clone(),
            ..PivotTableField::default()
        };
        apply_flags(FIELD_FLAGS, &field.flags, &mut extracted);
        axis.push(extracted);
    }

    for data in &definition.data_fields {
        let Some(header) = order.get(data.fld as usize) else {
            log::warn!(
                "{}: data field index {} is beyond the {} columns of {}",
                link.table_part,
                data.fld,
                order.len(),
                source.reference
            );
            continue;
        };
        options.data.push(PivotTableField {
            data: header.clone(),
            name: data.name.clone(),
            subtotal: Some(data.subtotal),
            ..PivotTableField::default()
        });
    }

    Ok(options)
}
