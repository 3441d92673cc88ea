mod xml;

pub use xml::{parse_table, write_table_xml, TableDefinition};

use crate::openxml::{rel_types, rels_part_name};
use crate::relationships::Relationships;
use crate::{XlsxError, XlsxPackage};

/// Relationship type for table parts from worksheet rels.
pub const TABLE_REL_TYPE: &str = rel_types::TABLE;

pub const TABLE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml";

/// A table part reachable from a worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablePart {
    pub r_id: String,
    pub part_name: String,
    pub table: TableDefinition,
}

/// Tables attached to `worksheet_part`, in relationship order.
///
/// Relationships pointing at missing parts are skipped.
pub fn worksheet_tables(
    package: &XlsxPackage,
    worksheet_part: &str,
) -> Result<Vec<TablePart>, XlsxError> {
    let rels = Relationships::parse(package.part(&rels_part_name(worksheet_part)))?;
    let mut out = Vec::new();
    for rel in rels.of_type(TABLE_REL_TYPE) {
        let Some(part_name) = rel.resolve(worksheet_part) else {
            continue;
        };
        let Some(bytes) = package.part(&part_name) else {
            log::warn!("{worksheet_part}: table relationship {} targets missing {part_name}", rel.id);
            continue;
        };
        let table = parse_table(std::str::from_utf8(bytes)?)?;
        out.push(TablePart {
            r_id: rel.id.clone(),
            part_name,
            table,
        });
    }
    Ok(out)
}
