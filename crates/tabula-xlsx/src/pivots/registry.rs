use crate::edits::PartEdits;
use crate::openxml::{rel_types, rels_part_name};
use crate::relationships::Relationships;
use crate::{XlsxError, XlsxPackage};

use super::{PIVOT_CACHE_DIR, PIVOT_CACHE_PREFIX, PIVOT_TABLE_DIR, PIVOT_TABLE_PREFIX};

/// Ordinal `N` of a part named `{dir}{prefix}{N}.xml` (ASCII case-insensitive).
fn part_ordinal(name: &str, dir: &str, prefix: &str) -> Option<u32> {
    let name = name.trim_start_matches('/').to_ascii_lowercase();
    let stem = format!("{dir}{prefix}").to_ascii_lowercase();
    name.strip_prefix(&stem)?
        .strip_suffix(".xml")?
        .parse::<u32>()
        .ok()
}

fn next_ordinal<'a>(names: impl Iterator<Item = &'a str>, dir: &str, prefix: &str) -> u32 {
    names
        .filter_map(|name| part_ordinal(name, dir, prefix))
        .max()
        .unwrap_or(0)
        + 1
}

pub(crate) fn is_pivot_cache_part(name: &str) -> bool {
    part_ordinal(name, PIVOT_CACHE_DIR, PIVOT_CACHE_PREFIX).is_some()
}

/// `N` for the next `xl/pivotTables/pivotTable{N}.xml`.
pub(crate) fn next_pivot_table_ordinal(edits: &PartEdits<'_>) -> u32 {
    next_ordinal(edits.part_names(), PIVOT_TABLE_DIR, PIVOT_TABLE_PREFIX)
}

/// `N` for the next `xl/pivotCache/pivotCacheDefinition{N}.xml`.
pub(crate) fn next_pivot_cache_ordinal(edits: &PartEdits<'_>) -> u32 {
    next_ordinal(edits.part_names(), PIVOT_CACHE_DIR, PIVOT_CACHE_PREFIX)
}

/// Append a relationship from `source_part` and stage the updated rels part.
pub(crate) fn add_relationship(
    edits: &mut PartEdits<'_>,
    source_part: &str,
    type_uri: &str,
    target: &str,
) -> Result<String, XlsxError> {
    let rels_part = rels_part_name(source_part);
    let mut rels = Relationships::parse(edits.part(&rels_part))?;
    let id = rels.add(type_uri, target);
    log::debug!("{rels_part}: {id} -> {target}");
    edits.set_part(&rels_part, rels.to_xml()?);
    Ok(id)
}

/// Remove relationship `id` from `source_part`'s rels and stage the result.
pub(crate) fn remove_relationship(
    edits: &mut PartEdits<'_>,
    source_part: &str,
    id: &str,
) -> Result<(), XlsxError> {
    let rels_part = rels_part_name(source_part);
    let mut rels = Relationships::parse(edits.part(&rels_part))?;
    if rels.remove(id).is_none() {
        return Err(XlsxError::Invalid(format!("{rels_part} has no relationship {id}")));
    }
    log::debug!("{rels_part}: removed {id}");
    edits.set_part(&rels_part, rels.to_xml()?);
    Ok(())
}

/// A pivot table reachable from a worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PivotTableLink {
    /// Id of the worksheet relationship pointing at the table.
    pub(crate) sheet_rel_id: String,
    pub(crate) table_part: String,
    /// Cache definition the table relationships point at.
    pub(crate) cache_part: Option<String>,
}

/// Pivot tables of `worksheet_part`, in relationship order.
pub(crate) fn worksheet_pivot_links(
    package: &XlsxPackage,
    worksheet_part: &str,
) -> Result<Vec<PivotTableLink>, XlsxError> {
    let sheet_rels = Relationships::parse(package.part(&rels_part_name(worksheet_part)))?;
    let mut links = Vec::new();
    for rel in sheet_rels.of_type(rel_types::PIVOT_TABLE) {
        let Some(table_part) = rel.resolve(worksheet_part) else {
            continue;
        };
        let table_rels = Relationships::parse(package.part(&rels_part_name(&table_part)))?;
        let cache_part = table_rels
            .of_type(rel_types::PIVOT_CACHE_DEFINITION)
            .find_map(|rel| rel.resolve(&table_part));
        if cache_part.is_none() {
            log::warn!("{table_part} has no pivot cache relationship");
        }
        links.push(PivotTableLink {
            sheet_rel_id: rel.id.clone(),
            table_part,
            cache_part,
        });
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn ordinals_follow_the_highest_existing_part() {
        let names = [
            "xl/pivotTables/pivotTable1.xml",
            "xl/pivotTables/pivotTable7.xml",
            "/XL/PivotTables/pivotTable3.xml",
            "xl/pivotTables/_rels/pivotTable9.xml.rels",
            "xl/pivotTables/pivotTableStyle.xml",
        ];
        assert_eq!(
            next_ordinal(names.into_iter(), PIVOT_TABLE_DIR, PIVOT_TABLE_PREFIX),
            8
        );
        assert_eq!(
            next_ordinal(names.into_iter(), PIVOT_CACHE_DIR, PIVOT_CACHE_PREFIX),
            1
        );
    }

    #[test]
    fn relationship_edits_are_staged() {
        let pkg = XlsxPackage::default();
        let mut edits = pkg.begin_edits();
        let first = add_relationship(
            &mut edits,
            "xl/worksheets/sheet1.xml",
            rel_types::PIVOT_TABLE,
            "../pivotTables/pivotTable1.xml",
        )
        .unwrap();
        let second = add_relationship(
            &mut edits,
            "xl/worksheets/sheet1.xml",
            rel_types::PIVOT_TABLE,
            "../pivotTables/pivotTable2.xml",
        )
        .unwrap();
        assert_eq!((first.as_str(), second.as_str()), ("rId1", "rId2"));

        remove_relationship(&mut edits, "xl/worksheets/sheet1.xml", "rId1").unwrap();
        assert!(remove_relationship(&mut edits, "xl/worksheets/sheet1.xml", "rId1").is_err());

        let rels = Relationships::parse(edits.part("xl/worksheets/_rels/sheet1.xml.rels")).unwrap();
        assert_eq!(rels.len(), 1);
        assert!(pkg.part("xl/worksheets/_rels/sheet1.xml.rels").is_none());
    }
}
