use tabula_model::{normalize_rectangle, CellRef, Range, SheetRect};

use crate::defined_names::{find_defined_name, parse_defined_names};
use crate::package::WORKBOOK_PART;
use crate::shared_strings::load_shared_strings;
use crate::tables::worksheet_tables;
use crate::worksheet::read_cell_text_in_range;
use crate::{WorksheetPartInfo, XlsxError, XlsxPackage};

use super::PivotTableError;

/// A pivot data source after name resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDataSource {
    /// The source rectangle, with the sheet spelled as the workbook spells it.
    pub reference: SheetRect,
    /// The table or defined name the rectangle came from, if any.
    pub name: Option<String>,
    pub(crate) worksheet_part: String,
}

impl ResolvedDataSource {
    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}

/// Resolve a `data_range` descriptor: a literal `Sheet!A1:B2` rectangle, a table name, or a
/// defined name (looked up from `pivot_sheet` first, then at workbook scope).
pub(crate) fn resolve_data_source(
    package: &XlsxPackage,
    data_range: &str,
    pivot_sheet: Option<&str>,
) -> Result<ResolvedDataSource, PivotTableError> {
    let descriptor = data_range.trim();
    if descriptor.is_empty() {
        return Err(PivotTableError::RequiredParameter("DataRange"));
    }

    let sheets = package.worksheet_parts()?;

    if descriptor.contains('!') {
        let reference = normalize_rectangle(descriptor).map_err(PivotTableError::data_range)?;
        return bind_to_sheet(&sheets, reference, None);
    }

    for info in &sheets {
        let tables = worksheet_tables(package, &info.worksheet_part)?;
        if let Some(table) = tables.iter().find(|t| t.table.matches_name(descriptor)) {
            log::debug!(
                "data range {descriptor:?} resolved to table {} on {}",
                table.table.display_name,
                info.name
            );
            return Ok(ResolvedDataSource {
                reference: SheetRect {
                    sheet: info.name.clone(),
                    range: table.table.range,
                },
                name: Some(descriptor.to_string()),
                worksheet_part: info.worksheet_part.clone(),
            });
        }
    }

    let workbook_xml = package
        .part(WORKBOOK_PART)
        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
    let workbook_xml = std::str::from_utf8(workbook_xml).map_err(XlsxError::from)?;
    let names = parse_defined_names(workbook_xml)?;
    let workbook_sheets = package.workbook_sheets()?;
    if let Some(defined) = find_defined_name(&names, &workbook_sheets, descriptor, pivot_sheet) {
        let target = defined.refers_to.trim_start_matches('=');
        let reference = normalize_rectangle(target).map_err(PivotTableError::data_range)?;
        log::debug!("data range {descriptor:?} resolved to defined name target {reference}");
        return bind_to_sheet(&sheets, reference, Some(descriptor.to_string()));
    }

    Err(PivotTableError::InvalidDataRange(format!(
        "{descriptor:?} is neither a range, a table nor a defined name"
    )))
}

fn bind_to_sheet(
    sheets: &[WorksheetPartInfo],
    reference: SheetRect,
    name: Option<String>,
) -> Result<ResolvedDataSource, PivotTableError> {
    let info = sheets
        .iter()
        .find(|info| tabula_model::sheet_name_eq_case_insensitive(&info.name, &reference.sheet))
        .ok_or_else(|| PivotTableError::SheetNotFound(reference.sheet.clone()))?;
    Ok(ResolvedDataSource {
        reference: SheetRect {
            sheet: info.name.clone(),
            range: reference.range,
        },
        name,
        worksheet_part: info.worksheet_part.clone(),
    })
}

/// Header texts of the source rectangle's first row, left to right.
///
/// Read from the live worksheet on every call. An empty header cell is an error because every
/// field needs a name.
pub(crate) fn field_order(
    package: &XlsxPackage,
    source: &ResolvedDataSource,
) -> Result<Vec<String>, PivotTableError> {
    let worksheet_xml = package
        .part(&source.worksheet_part)
        .ok_or_else(|| XlsxError::MissingPart(source.worksheet_part.clone()))?;
    let shared_strings = load_shared_strings(package)?;

    let range = source.reference.range;
    let header_row = Range::new(range.start, CellRef::new(range.start.row, range.end.col));
    let mut cells = read_cell_text_in_range(worksheet_xml, header_row, &shared_strings)?;

    range
        .header_cells()
        .map(|cell| {
            cells.remove(&cell).ok_or_else(|| {
                PivotTableError::InvalidParameter(format!(
                    "header cell {} of {} is empty",
                    cell.to_a1(),
                    source.reference
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    use crate::minimal::{MinimalCell, MinimalWorkbook};

    fn sales_rows() -> Vec<Vec<MinimalCell>> {
        vec![
            vec!["Month".into(), "Year".into(), "Sales".into()],
            vec!["Jan".into(), 2024.into(), 105.5.into()],
        ]
    }

    fn package() -> XlsxPackage {
        MinimalWorkbook::new()
            .sheet("Data", sales_rows())
            .sheet("Report", Vec::new())
            .table("Data", "SalesTable", "A1:C2")
            .unwrap()
            .defined_name("SalesTable", "Report!$A$1:$B$2", None)
            .defined_name("Scoped", "Data!$A$1:$B$2", None)
            .defined_name("Scoped", "Data!$A$1:$C$2", Some("Report"))
            .build()
            .unwrap()
    }

    #[test]
    fn literal_ranges_bind_to_the_workbook_sheet_name() {
        let pkg = package();
        let source = resolve_data_source(&pkg, "data!$C$2:A1", None).unwrap();
        assert_eq!(source.reference.to_string(), "Data!A1:C2");
        assert!(!source.is_named());
    }

    #[test]
    fn tables_win_over_defined_names() {
        let pkg = package();
        let source = resolve_data_source(&pkg, "SalesTable", Some("Report")).unwrap();
        assert_eq!(source.reference.to_string(), "Data!A1:C2");
        assert_eq!(source.name.as_deref(), Some("SalesTable"));

        // Table names match exactly; other spellings reach the defined name.
        let source = resolve_data_source(&pkg, "salestable", Some("Report")).unwrap();
        assert_eq!(source.reference.to_string(), "Report!A1:B2");
    }

    #[test]
    fn sheet_scoped_defined_names_win_over_global_ones() {
        let pkg = package();
        let local = resolve_data_source(&pkg, "Scoped", Some("Report")).unwrap();
        assert_eq!(local.reference.to_string(), "Data!A1:C2");
        let global = resolve_data_source(&pkg, "Scoped", Some("Data")).unwrap();
        assert_eq!(global.reference.to_string(), "Data!A1:B2");
    }

    #[test]
    fn unresolvable_sources_are_rejected() {
        let pkg = package();
        assert!(matches!(
            resolve_data_source(&pkg, "  ", None),
            Err(PivotTableError::RequiredParameter(_))
        ));
        assert!(matches!(
            resolve_data_source(&pkg, "Nope", None),
            Err(PivotTableError::InvalidDataRange(_))
        ));
        assert!(matches!(
            resolve_data_source(&pkg, "Data!A1", None),
            Err(PivotTableError::InvalidDataRange(_))
        ));
        assert!(matches!(
            resolve_data_source(&pkg, "Missing!A1:B2", None),
            Err(PivotTableError::SheetNotFound(sheet)) if sheet == "Missing"
        ));
    }

    #[test]
    fn field_order_reads_header_text() {
        let pkg = package();
        let source = resolve_data_source(&pkg, "Data!A1:C2", None).unwrap();
        assert_eq!(field_order(&pkg, &source).unwrap(), vec!["Month", "Year", "Sales"]);
    }

    #[test]
    fn empty_header_cells_are_rejected() {
        let pkg = package();
        let source = resolve_data_source(&pkg, "Data!A1:D2", None).unwrap();
        let err = field_order(&pkg, &source).unwrap_err();
        assert!(matches!(err, PivotTableError::InvalidParameter(ref msg) if msg.contains("D1")));
    }
}
