use tabula_model::pivots::{
    truncate_field_name, PivotTableField, PivotTableOptions, MAX_FIELD_LENGTH,
};
use tabula_model::Range;

use super::table_definition::{
    flags_from, ColField, DataField, PageField, PivotAxis, PivotFieldDef, PivotItem,
    PivotTableDefinition, XmlFlags, FIELD_FLAGS, STYLE_FLAGS, TABLE_FLAGS,
};
use super::{PivotTableError, PIVOT_DATA_CAPTION};

/// Reject a pivot table name longer than [`MAX_FIELD_LENGTH`] characters.
pub(crate) fn check_table_name(name: &str) -> Result<(), PivotTableError> {
    if name.chars().count() > MAX_FIELD_LENGTH {
        return Err(PivotTableError::NameTooLong);
    }
    Ok(())
}

fn find_field<'a>(fields: &'a [PivotTableField], data: &str) -> Option<&'a PivotTableField> {
    fields.iter().find(|f| f.data == data)
}

fn display_name(field: &PivotTableField) -> Option<String> {
    field
        .display_name()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Resolve each field's header text to its position in `order`; the first match wins.
fn field_indices(fields: &[PivotTableField], order: &[String]) -> Result<Vec<u32>, PivotTableError> {
    fields
        .iter()
        .map(|field| {
            order
                .iter()
                .position(|header| *header == field.data)
                .map(|idx| idx as u32)
                .ok_or_else(|| {
                    PivotTableError::InvalidDataRange(format!(
                        "field {:?} is not a column of the data range",
                        field.data
                    ))
                })
        })
        .collect()
}

fn axis_field(axis: PivotAxis, field: &PivotTableField, data_field: bool) -> PivotFieldDef {
    let item = if field.default_subtotal {
        PivotItem::Default
    } else {
        PivotItem::Index(0)
    };
    PivotFieldDef {
        name: display_name(field),
        axis: Some(axis),
        data_field,
        flags: flags_from(FIELD_FLAGS, field),
        items: vec![item],
    }
}

/// The `pivotField` for one header. A field listed in several axis lists takes the first of
/// rows, filter and columns; the later listings are ignored.
fn classify(options: &PivotTableOptions, header: &str) -> PivotFieldDef {
    let data_field = find_field(&options.data, header).is_some();

    if let Some(field) = find_field(&options.rows, header) {
        return axis_field(PivotAxis::Row, field, data_field);
    }
    if let Some(field) = find_field(&options.filter, header) {
        return PivotFieldDef {
            name: display_name(field),
            axis: Some(PivotAxis::Page),
            data_field,
            flags: XmlFlags::new(),
            items: vec![PivotItem::Default],
        };
    }
    if let Some(field) = find_field(&options.columns, header) {
        return axis_field(PivotAxis::Column, field, data_field);
    }
    PivotFieldDef {
        data_field,
        ..PivotFieldDef::default()
    }
}

/// Build the table definition for `options` over the header `order`.
///
/// Page fields without a display name are labelled with their header text.
pub(crate) fn build_table_definition(
    options: &PivotTableOptions,
    order: &[String],
    name: String,
    cache_id: u32,
    location: Range,
) -> Result<PivotTableDefinition, PivotTableError> {
    let row_fields = field_indices(&options.rows, order)?;
    let column_indices = field_indices(&options.columns, order)?;
    let page_indices = field_indices(&options.filter, order)?;
    let data_indices = field_indices(&options.data, order)?;

    let pivot_fields = order.iter().map(|header| classify(options, header)).collect();

    let mut col_fields: Vec<ColField> = column_indices.into_iter().map(ColField::Field).collect();
    if options.data.len() > 1 {
        col_fields.push(ColField::Values);
    }

    let page_fields = options
        .filter
        .iter()
        .zip(page_indices)
        .map(|(field, fld)| PageField {
            fld,
            name: display_name(field)
                .or_else(|| Some(truncate_field_name(&field.data).to_string())),
        })
        .collect();

    let data_fields = options
        .data
        .iter()
        .zip(data_indices)
        .map(|(field, fld)| DataField {
            name: display_name(field),
            fld,
            subtotal: field.subtotal_or_default(),
        })
        .collect();

    Ok(PivotTableDefinition {
        name,
        cache_id,
        data_caption: PIVOT_DATA_CAPTION.to_string(),
        location,
        flags: flags_from(TABLE_FLAGS, options),
        style_name: Some(options.style_name_or_default().to_string()),
        style_flags: flags_from(STYLE_FLAGS, options),
        pivot_fields,
        row_fields,
        col_fields,
        page_fields,
        data_fields,
    })
}
