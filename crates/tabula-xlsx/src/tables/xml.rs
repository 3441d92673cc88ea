use quick_xml::{de::from_str, se::to_string};
use serde::{Deserialize, Serialize};
use tabula_model::Range;

use crate::openxml::SPREADSHEETML_NS;
use crate::XlsxError;

/// The parts of a `<table>` definition the pivot layer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub id: u32,
    pub name: String,
    pub display_name: String,
    pub range: Range,
    pub columns: Vec<String>,
}

impl TableDefinition {
    /// Exact match against either `name` or `displayName`.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name == name || self.display_name == name
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename = "table")]
struct TableXml {
    #[serde(rename = "@id")]
    id: u32,
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@displayName")]
    display_name: String,
    #[serde(rename = "@ref")]
    reference: String,
    #[serde(rename = "tableColumns", default)]
    table_columns: Option<TableColumnsXml>,
}

#[derive(Debug, Deserialize)]
struct TableColumnsXml {
    #[serde(rename = "tableColumn", default)]
    columns: Vec<TableColumnXml>,
}

#[derive(Debug, Deserialize)]
struct TableColumnXml {
    #[serde(rename = "@name")]
    name: String,
}

pub fn parse_table(xml: &str) -> Result<TableDefinition, XlsxError> {
    let table: TableXml = from_str(xml)?;
    let range = Range::from_a1(&table.reference).map_err(|e| {
        XlsxError::Invalid(format!("invalid table ref {:?}: {e}", table.reference))
    })?;
    Ok(TableDefinition {
        id: table.id,
        name: table.name.unwrap_or_else(|| table.display_name.clone()),
        display_name: table.display_name,
        range,
        columns: table
            .table_columns
            .map(|c| c.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default(),
    })
}

#[derive(Debug, Serialize)]
#[serde(rename = "table")]
struct TableXmlOut<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'a str,
    #[serde(rename = "@id")]
    id: u32,
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@displayName")]
    display_name: &'a str,
    #[serde(rename = "@ref")]
    reference: String,
    #[serde(rename = "autoFilter")]
    auto_filter: AutoFilterXmlOut,
    #[serde(rename = "tableColumns")]
    table_columns: TableColumnsXmlOut<'a>,
    #[serde(rename = "tableStyleInfo")]
    style_info: TableStyleInfoXmlOut,
}

#[derive(Debug, Serialize)]
struct AutoFilterXmlOut {
    #[serde(rename = "@ref")]
    reference: String,
}

#[derive(Debug, Serialize)]
struct TableColumnsXmlOut<'a> {
    #[serde(rename = "@count")]
    count: u32,
    #[serde(rename = "tableColumn")]
    columns: Vec<TableColumnXmlOut<'a>>,
}

#[derive(Debug, Serialize)]
struct TableColumnXmlOut<'a> {
    #[serde(rename = "@id")]
    id: u32,
    #[serde(rename = "@name")]
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct TableStyleInfoXmlOut {
    #[serde(rename = "@name")]
    name: &'static str,
    #[serde(rename = "@showFirstColumn")]
    show_first_column: u8,
    #[serde(rename = "@showLastColumn")]
    show_last_column: u8,
    #[serde(rename = "@showRowStripes")]
    show_row_stripes: u8,
    #[serde(rename = "@showColumnStripes")]
    show_column_stripes: u8,
}

pub fn write_table_xml(table: &TableDefinition) -> Result<String, XlsxError> {
    let xml = TableXmlOut {
        xmlns: SPREADSHEETML_NS,
        id: table.id,
        name: &table.name,
        display_name: &table.display_name,
        reference: table.range.to_string(),
        auto_filter: AutoFilterXmlOut {
            reference: table.range.to_string(),
        },
        table_columns: TableColumnsXmlOut {
            count: table.columns.len() as u32,
            columns: table
                .columns
                .iter()
                .zip(1u32..)
                .map(|(name, id)| TableColumnXmlOut { id, name })
                .collect(),
        },
        style_info: TableStyleInfoXmlOut {
            name: "TableStyleMedium2",
            show_first_column: 0,
            show_last_column: 0,
            show_row_stripes: 1,
            show_column_stripes: 0,
        },
    };
    Ok(to_string(&xml)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parses_excel_table_part() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="3" name="Table3" displayName="SalesTable" ref="A1:E31" totalsRowShown="0">
  <autoFilter ref="A1:E31"/>
  <tableColumns count="2"><tableColumn id="1" name="Month"/><tableColumn id="2" name="Year"/></tableColumns>
  <tableStyleInfo name="TableStyleMedium9" showFirstColumn="0" showLastColumn="0" showRowStripes="1" showColumnStripes="0"/>
</table>"#;
        let table = parse_table(xml).unwrap();
        assert_eq!(table.id, 3);
        assert_eq!(table.display_name, "SalesTable");
        assert_eq!(table.range.to_string(), "A1:E31");
        assert_eq!(table.columns, vec!["Month", "Year"]);
        assert!(table.matches_name("SalesTable"));
        assert!(table.matches_name("Table3"));
        assert!(!table.matches_name("salestable"));
    }

    #[test]
    fn written_tables_parse_back() {
        let table = TableDefinition {
            id: 1,
            name: "Sales".to_string(),
            display_name: "Sales".to_string(),
            range: Range::from_a1("B2:C5").unwrap(),
            columns: vec!["Region".to_string(), "Amount".to_string()],
        };
        let xml = write_table_xml(&table).unwrap();
        assert_eq!(parse_table(&xml).unwrap(), table);
    }
}
