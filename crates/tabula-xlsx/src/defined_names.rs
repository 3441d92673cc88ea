use roxmltree::Document;
use tabula_model::sheet_name_eq_case_insensitive;

use crate::sheet_metadata::WorkbookSheetInfo;
use crate::XlsxError;

/// A `<definedName>` from `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    /// 0-based index into the workbook sheet list; `None` for workbook scope.
    pub local_sheet_id: Option<u32>,
    /// Formula text, e.g. `Sheet1!$A$1:$E$31`.
    pub refers_to: String,
    pub hidden: bool,
}

pub fn parse_defined_names(workbook_xml: &str) -> Result<Vec<DefinedName>, XlsxError> {
    let doc = Document::parse(workbook_xml)?;
    let mut out = Vec::new();
    for node in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "definedName")
    {
        let Some(name) = node.attribute("name") else {
            continue;
        };
        let local_sheet_id = node
            .attribute("localSheetId")
            .map(|v| {
                v.trim().parse::<u32>().map_err(|_| {
                    XlsxError::Invalid(format!("invalid localSheetId {v:?} on {name:?}"))
                })
            })
            .transpose()?;
        let hidden = node
            .attribute("hidden")
            .and_then(crate::openxml::parse_xml_bool)
            .unwrap_or(false);
        let refers_to: String = node
            .children()
            .filter_map(|c| c.text())
            .collect::<String>()
            .trim()
            .to_string();
        out.push(DefinedName {
            name: name.to_string(),
            local_sheet_id,
            refers_to,
            hidden,
        });
    }
    Ok(out)
}

/// Look up `name` as seen from `scope_sheet`: a name local to that sheet wins over a
/// workbook-scoped one. Names compare case-insensitively.
pub fn find_defined_name<'a>(
    names: &'a [DefinedName],
    sheets: &[WorkbookSheetInfo],
    name: &str,
    scope_sheet: Option<&str>,
) -> Option<&'a DefinedName> {
    let scope_index = scope_sheet.and_then(|scope| {
        sheets
            .iter()
            .position(|s| sheet_name_eq_case_insensitive(&s.name, scope))
    });
    let named = |dn: &&DefinedName| dn.name.eq_ignore_ascii_case(name);

    if let Some(idx) = scope_index {
        let local = names
            .iter()
            .filter(named)
            .find(|dn| dn.local_sheet_id == Some(idx as u32));
        if local.is_some() {
            return local;
        }
    }
    names
        .iter()
        .filter(named)
        .find(|dn| dn.local_sheet_id.is_none())
}
