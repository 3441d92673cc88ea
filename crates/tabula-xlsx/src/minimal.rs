use std::collections::BTreeMap;

use quick_xml::escape::escape;
use tabula_model::{CellRef, Range};

use crate::openxml::{rel_types, rels_part_name};
use crate::relationships::Relationships;
use crate::tables::{write_table_xml, TableDefinition, TABLE_CONTENT_TYPE, TABLE_REL_TYPE};
use crate::{XlsxError, XlsxPackage};

/// A cell value for [`MinimalWorkbook`].
#[derive(Debug, Clone, PartialEq)]
pub enum MinimalCell {
    Empty,
    /// Stored through the shared string table.
    Text(String),
    /// Stored as an inline string (`t="inlineStr"`).
    InlineText(String),
    Number(f64),
}

impl From<&str> for MinimalCell {
    fn from(value: &str) -> Self {
        MinimalCell::Text(value.to_string())
    }
}

impl From<String> for MinimalCell {
    fn from(value: String) -> Self {
        MinimalCell::Text(value)
    }
}

impl From<f64> for MinimalCell {
    fn from(value: f64) -> Self {
        MinimalCell::Number(value)
    }
}

impl From<i32> for MinimalCell {
    fn from(value: i32) -> Self {
        MinimalCell::Number(value.into())
    }
}

#[derive(Debug, Clone)]
struct MinimalSheet {
    name: String,
    rows: Vec<Vec<MinimalCell>>,
}

#[derive(Debug, Clone)]
struct MinimalTable {
    sheet: String,
    name: String,
    range: Range,
}

#[derive(Debug, Clone)]
struct MinimalDefinedName {
    name: String,
    refers_to: String,
    local_sheet: Option<String>,
}

/// Builds a small but complete workbook package: worksheets with cell values, a shared string
/// table, tables and defined names.
///
/// Rows start at `A1` of each sheet.
#[derive(Debug, Clone, Default)]
pub struct MinimalWorkbook {
    sheets: Vec<MinimalSheet>,
    tables: Vec<MinimalTable>,
    defined_names: Vec<MinimalDefinedName>,
}

impl MinimalWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(mut self, name: impl Into<String>, rows: Vec<Vec<MinimalCell>>) -> Self {
        self.sheets.push(MinimalSheet {
            name: name.into(),
            rows,
        });
        self
    }

    /// Attach a table covering `range` (A1, e.g. `A1:E31`) to `sheet`.
    pub fn table(
        mut self,
        sheet: impl Into<String>,
        name: impl Into<String>,
        range: &str,
    ) -> Result<Self, XlsxError> {
        let range = Range::from_a1(range)
            .map_err(|e| XlsxError::Invalid(format!("invalid table range {range:?}: {e}")))?;
        self.tables.push(MinimalTable {
            sheet: sheet.into(),
            name: name.into(),
            range,
        });
        Ok(self)
    }

    /// Add a defined name; `local_sheet` scopes it to one sheet.
    pub fn defined_name(
        mut self,
        name: impl Into<String>,
        refers_to: impl Into<String>,
        local_sheet: Option<&str>,
    ) -> Self {
        self.defined_names.push(MinimalDefinedName {
            name: name.into(),
            refers_to: refers_to.into(),
            local_sheet: local_sheet.map(str::to_string),
        });
        self
    }

    pub fn build(&self) -> Result<XlsxPackage, XlsxError> {
        let mut parts = BTreeMap::new();
        let mut overrides: Vec<(String, &'static str)> = vec![(
            "xl/workbook.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
        )];

        let mut shared_strings = SharedStringsBuilder::default();
        let mut workbook_rels = Relationships::default();
        for (idx, sheet) in self.sheets.iter().enumerate() {
            let part = format!("xl/worksheets/sheet{}.xml", idx + 1);
            workbook_rels.add(
                rel_types::WORKSHEET,
                &format!("worksheets/sheet{}.xml", idx + 1),
            );
            parts.insert(
                part.clone(),
                worksheet_xml(&sheet.rows, &mut shared_strings).into_bytes(),
            );
            overrides.push((
                part,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml",
            ));
        }
        workbook_rels.add(rel_types::SHARED_STRINGS, "sharedStrings.xml");

        let mut sheet_rels: BTreeMap<usize, Relationships> = BTreeMap::new();
        for (idx, table) in self.tables.iter().enumerate() {
            let sheet_idx = self.sheet_index(&table.sheet)?;
            let id = idx as u32 + 1;
            let definition = TableDefinition {
                id,
                name: table.name.clone(),
                display_name: table.name.clone(),
                range: table.range,
                columns: self.header_texts(sheet_idx, table.range),
            };
            let part = format!("xl/tables/table{id}.xml");
            parts.insert(part.clone(), write_table_xml(&definition)?.into_bytes());
            overrides.push((part, TABLE_CONTENT_TYPE));
            sheet_rels
                .entry(sheet_idx)
                .or_default()
                .add(TABLE_REL_TYPE, &format!("../tables/table{id}.xml"));
        }
        for (sheet_idx, rels) in sheet_rels {
            let sheet_part = format!("xl/worksheets/sheet{}.xml", sheet_idx + 1);
            parts.insert(rels_part_name(&sheet_part), rels.to_xml()?);
        }

        parts.insert("xl/workbook.xml".to_string(), self.workbook_xml()?.into_bytes());
        parts.insert(
            rels_part_name("xl/workbook.xml"),
            workbook_rels.to_xml()?,
        );
        parts.insert(
            "xl/sharedStrings.xml".to_string(),
            shared_strings.to_xml().into_bytes(),
        );
        overrides.push((
            "xl/sharedStrings.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml",
        ));

        let mut root_rels = Relationships::default();
        root_rels.add(rel_types::OFFICE_DOCUMENT, "xl/workbook.xml");
        parts.insert("_rels/.rels".to_string(), root_rels.to_xml()?);
        parts.insert(
            "[Content_Types].xml".to_string(),
            content_types_xml(&overrides).into_bytes(),
        );

        Ok(XlsxPackage::from_parts_map(parts))
    }

    fn sheet_index(&self, name: &str) -> Result<usize, XlsxError> {
        self.sheets
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| XlsxError::Invalid(format!("unknown sheet {name:?}")))
    }

    fn header_texts(&self, sheet_idx: usize, range: Range) -> Vec<String> {
        let row = self.sheets[sheet_idx].rows.get(range.start.row as usize);
        range
            .header_cells()
            .zip(1..)
            .map(|(cell, n)| match row.and_then(|r| r.get(cell.col as usize)) {
                Some(MinimalCell::Text(t)) | Some(MinimalCell::InlineText(t)) => t.clone(),
                Some(MinimalCell::Number(v)) => v.to_string(),
                _ => format!("Column{n}"),
            })
            .collect()
    }

    fn workbook_xml(&self) -> Result<String, XlsxError> {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#);
        out.push_str("<sheets>");
        for (idx, sheet) in self.sheets.iter().enumerate() {
            out.push_str(&format!(
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape(sheet.name.as_str()),
                idx + 1,
                idx + 1
            ));
        }
        out.push_str("</sheets>");
        if !self.defined_names.is_empty() {
            out.push_str("<definedNames>");
            for dn in &self.defined_names {
                let scope = match &dn.local_sheet {
                    Some(sheet) => format!(r#" localSheetId="{}""#, self.sheet_index(sheet)?),
                    None => String::new(),
                };
                out.push_str(&format!(
                    r#"<definedName name="{}"{scope}>{}</definedName>"#,
                    escape(dn.name.as_str()),
                    escape(dn.refers_to.as_str())
                ));
            }
            out.push_str("</definedNames>");
        }
        out.push_str(r#"<calcPr calcId="191029"/>"#);
        out.push_str("</workbook>");
        Ok(out)
    }
}

#[derive(Debug, Default)]
struct SharedStringsBuilder {
    items: Vec<String>,
    index: BTreeMap<String, usize>,
    count: usize,
}

impl SharedStringsBuilder {
    fn intern(&mut self, text: &str) -> usize {
        self.count += 1;
        if let Some(idx) = self.index.get(text) {
            return *idx;
        }
        let idx = self.items.len();
        self.items.push(text.to_string());
        self.index.insert(text.to_string(), idx);
        idx
    }

    fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
        out.push('\n');
        out.push_str(&format!(
            r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{}" uniqueCount="{}">"#,
            self.count,
            self.items.len()
        ));
        for item in &self.items {
            out.push_str(&format!("<si><t>{}</t></si>", escape(item.as_str())));
        }
        out.push_str("</sst>");
        out
    }
}

fn worksheet_xml(rows: &[Vec<MinimalCell>], shared_strings: &mut SharedStringsBuilder) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#);
    if rows.is_empty() {
        out.push_str("<sheetData/>");
    } else {
        out.push_str("<sheetData>");
        for (row_idx, row) in rows.iter().enumerate() {
            out.push_str(&format!(r#"<row r="{}">"#, row_idx + 1));
            for (col_idx, cell) in row.iter().enumerate() {
                let a1 = CellRef::new(row_idx as u32, col_idx as u32).to_a1();
                match cell {
                    MinimalCell::Empty => {}
                    MinimalCell::Text(text) => {
                        let idx = shared_strings.intern(text);
                        out.push_str(&format!(r#"<c r="{a1}" t="s"><v>{idx}</v></c>"#));
                    }
                    MinimalCell::InlineText(text) => out.push_str(&format!(
                        r#"<c r="{a1}" t="inlineStr"><is><t>{}</t></is></c>"#,
                        escape(text.as_str())
                    )),
                    MinimalCell::Number(v) => {
                        out.push_str(&format!(r#"<c r="{a1}"><v>{v}</v></c>"#))
                    }
                }
            }
            out.push_str("</row>");
        }
        out.push_str("</sheetData>");
    }
    out.push_str("</worksheet>");
    out
}

fn content_types_xml(overrides: &[(String, &str)]) -> String {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    out.push('\n');
    out.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    out.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    out.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    for (part, content_type) in overrides {
        out.push_str(&format!(
            r#"<Override PartName="/{part}" ContentType="{content_type}"/>"#
        ));
    }
    out.push_str("</Types>");
    out
}
