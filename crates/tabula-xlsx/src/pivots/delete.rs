use std::collections::{BTreeMap, BTreeSet};

use crate::openxml::{rel_types, rels_part_name};
use crate::package::WORKBOOK_PART;
use crate::relationships::Relationships;
use crate::{XlsxError, XlsxPackage};

use super::extract::find_worksheet;
use super::registry::{
    is_pivot_cache_part, remove_relationship, worksheet_pivot_links, PivotTableLink,
};
use super::table_definition::parse_pivot_table_definition;
use super::workbook_caches::{parse_workbook_pivot_caches, remove_workbook_pivot_cache};
use super::PivotTableError;

impl XlsxPackage {
    /// Detach the pivot table named `name` (exact match) from `sheet`.
    ///
    /// The worksheet relationship to the table is removed. When no other pivot table in the
    /// workbook still points at the same cache, the cache is unregistered from the workbook as
    /// well. Part bytes are left in the package; see [`XlsxPackage::orphaned_pivot_cache_parts`].
    pub fn delete_pivot_table(&mut self, sheet: &str, name: &str) -> Result<(), PivotTableError> {
        let staged = stage_pivot_table_deletion(self, sheet, name)?;
        self.apply_edits(staged);
        Ok(())
    }

    /// Pivot cache definition parts that no `<pivotCache>` entry of the workbook reaches.
    pub fn orphaned_pivot_cache_parts(&self) -> Result<Vec<String>, XlsxError> {
        let workbook_rels = Relationships::parse(self.part(&rels_part_name(WORKBOOK_PART)))?;
        let registered: Vec<String> = match self.part(WORKBOOK_PART) {
            Some(xml) => parse_workbook_pivot_caches(xml)?
                .into_iter()
                .filter_map(|cache| workbook_rels.get(&cache.rel_id)?.resolve(WORKBOOK_PART))
                .collect(),
            None => Vec::new(),
        };

        let orphans: BTreeSet<String> = self
            .part_names()
            .filter(|name| is_pivot_cache_part(name))
            .filter(|name| !registered.iter().any(|r| r.eq_ignore_ascii_case(name)))
            .map(str::to_string)
            .collect();
        Ok(orphans.into_iter().collect())
    }
}

fn find_table(
    package: &XlsxPackage,
    worksheet_part: &str,
    name: &str,
) -> Result<Option<PivotTableLink>, PivotTableError> {
    for link in worksheet_pivot_links(package, worksheet_part)? {
        let Some(xml) = package.part(&link.table_part) else {
            log::warn!("{worksheet_part} points at missing part {}", link.table_part);
            continue;
        };
        if parse_pivot_table_definition(xml)?.name == name {
            return Ok(Some(link));
        }
    }
    Ok(None)
}

/// Number of pivot tables across all worksheets whose cache is `cache_part`.
fn cache_users(package: &XlsxPackage, cache_part: &str) -> Result<usize, XlsxError> {
    let mut users = 0;
    for info in package.worksheet_parts()? {
        users += worksheet_pivot_links(package, &info.worksheet_part)?
            .iter()
            .filter(|link| {
                link.cache_part
                    .as_deref()
                    .is_some_and(|part| part.eq_ignore_ascii_case(cache_part))
            })
            .count();
    }
    Ok(users)
}

fn stage_pivot_table_deletion(
    package: &XlsxPackage,
    sheet: &str,
    name: &str,
) -> Result<BTreeMap<String, Vec<u8>>, PivotTableError> {
    let info = find_worksheet(package, sheet)?;
    let link = find_table(package, &info.worksheet_part, name)?
        .ok_or_else(|| PivotTableError::TableNotFound(name.to_string()))?;

    let mut edits = package.begin_edits();

    if let Some(cache_part) = link.cache_part.as_deref() {
        if cache_users(package, cache_part)? <= 1 {
            let workbook_rels =
                Relationships::parse(package.part(&rels_part_name(WORKBOOK_PART)))?;
            let rel_id = workbook_rels
                .of_type(rel_types::PIVOT_CACHE_DEFINITION)
                .find(|rel| {
                    rel.resolve(WORKBOOK_PART)
                        .is_some_and(|target| target.eq_ignore_ascii_case(cache_part))
                })
                .map(|rel| rel.id.clone());
            match rel_id {
                Some(rel_id) => {
                    log::debug!("unregistering pivot cache {cache_part} ({rel_id})");
                    remove_relationship(&mut edits, WORKBOOK_PART, &rel_id)?;
                    let workbook_xml = edits
                        .part(WORKBOOK_PART)
                        .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
                    let workbook_xml = remove_workbook_pivot_cache(workbook_xml, &rel_id)?;
                    edits.set_part(WORKBOOK_PART, workbook_xml);
                }
                None => log::warn!("{cache_part} is not referenced from the workbook"),
            }
        } else {
            log::debug!("keeping pivot cache {cache_part}, still in use");
        }
    }

    remove_relationship(&mut edits, &info.worksheet_part, &link.sheet_rel_id)?;
    Ok(edits.into_staged())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use tabula_model::pivots::{PivotTableField, PivotTableOptions};

    use crate::minimal::{MinimalCell, MinimalWorkbook};

    fn package() -> XlsxPackage {
        let rows: Vec<Vec<MinimalCell>> = vec![
            vec!["Month".into(), "Sales".into()],
            vec!["Jan".into(), 10.0.into()],
            vec!["Feb".into(), 12.5.into()],
        ];
        let mut pkg = MinimalWorkbook::new()
            .sheet("Data", rows)
            .sheet("Report", Vec::new())
            .build()
            .unwrap();
        for (name, at) in [("First", "Report!D2:F10"), ("Second", "Report!H2:J10")] {
            pkg.add_pivot_table(&PivotTableOptions {
                data_range: "Data!A1:B3".to_string(),
                pivot_table_range: at.to_string(),
                name: name.to_string(),
                rows: vec![PivotTableField::new("Month")],
                data: vec![PivotTableField::new("Sales")],
                ..PivotTableOptions::default()
            })
            .unwrap();
        }
        pkg
    }

    fn registered_caches(pkg: &XlsxPackage) -> usize {
        parse_workbook_pivot_caches(pkg.part(WORKBOOK_PART).unwrap())
            .unwrap()
            .len()
    }

    #[test]
    fn deleting_unregisters_an_unshared_cache() {
        let mut pkg = package();
        assert_eq!(registered_caches(&pkg), 2);

        pkg.delete_pivot_table("report", "First").unwrap();

        let names: Vec<_> = pkg
            .pivot_tables("Report")
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["Second"]);
        assert_eq!(registered_caches(&pkg), 1);
        assert_eq!(
            pkg.orphaned_pivot_cache_parts().unwrap(),
            vec!["xl/pivotCache/pivotCacheDefinition1.xml"]
        );
        assert!(pkg.part("xl/pivotTables/pivotTable1.xml").is_some());
    }

    #[test]
    fn shared_caches_survive_until_the_last_table_goes() {
        let mut pkg = package();
        // A third table reusing the first table's cache.
        let table = String::from_utf8(pkg.part("xl/pivotTables/pivotTable1.xml").unwrap().to_vec())
            .unwrap()
            .replace("name=\"First\"", "name=\"Third\"");
        pkg.set_part("xl/pivotTables/pivotTable3.xml", table.into_bytes());
        let table_rels = pkg
            .part("xl/pivotTables/_rels/pivotTable1.xml.rels")
            .unwrap()
            .to_vec();
        pkg.set_part("xl/pivotTables/_rels/pivotTable3.xml.rels", table_rels);
        let mut sheet_rels =
            Relationships::parse(pkg.part("xl/worksheets/_rels/sheet2.xml.rels")).unwrap();
        sheet_rels.add(rel_types::PIVOT_TABLE, "../pivotTables/pivotTable3.xml");
        pkg.set_part("xl/worksheets/_rels/sheet2.xml.rels", sheet_rels.to_xml().unwrap());

        pkg.delete_pivot_table("Report", "First").unwrap();
        assert_eq!(registered_caches(&pkg), 2);
        assert_eq!(pkg.orphaned_pivot_cache_parts().unwrap(), Vec::<String>::new());

        pkg.delete_pivot_table("Report", "Third").unwrap();
        assert_eq!(registered_caches(&pkg), 1);
        assert!(pkg.pivot_tables("Report").unwrap().iter().all(|t| t.name == "Second"));
    }

    #[test]
    fn deleting_the_last_cache_drops_pivot_caches() {
        let mut pkg = package();
        pkg.delete_pivot_table("Report", "First").unwrap();
        pkg.delete_pivot_table("Report", "Second").unwrap();

        let workbook = std::str::from_utf8(pkg.part(WORKBOOK_PART).unwrap()).unwrap();
        assert!(!workbook.contains("pivotCaches"), "{workbook}");
        assert!(pkg.pivot_tables("Report").unwrap().is_empty());
        assert_eq!(pkg.orphaned_pivot_cache_parts().unwrap().len(), 2);
    }

    #[test]
    fn unknown_tables_leave_the_package_untouched() {
        let mut pkg = package();
        let before: Vec<(String, Vec<u8>)> = pkg
            .parts()
            .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
            .collect();

        assert!(matches!(
            pkg.delete_pivot_table("Report", "first"),
            Err(PivotTableError::TableNotFound(name)) if name == "first"
        ));
        assert!(matches!(
            pkg.delete_pivot_table("Nowhere", "First"),
            Err(PivotTableError::SheetNotFound(_))
        ));

        let after: Vec<(String, Vec<u8>)> = pkg
            .parts()
            .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
            .collect();
        assert_eq!(before, after);
    }
}
