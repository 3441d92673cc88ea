use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::openxml::local_name;
use crate::XlsxError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// One `<sheet>` entry of `workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookSheetInfo {
    pub name: String,
    pub sheet_id: u32,
    /// Workbook relationship pointing at the worksheet part.
    pub rel_id: String,
    pub visibility: SheetVisibility,
}

impl SheetVisibility {
    fn from_state(state: &str) -> Self {
        match state {
            "hidden" => SheetVisibility::Hidden,
            "veryHidden" => SheetVisibility::VeryHidden,
            _ => SheetVisibility::Visible,
        }
    }
}

/// Sheets of a workbook in tab order.
pub fn parse_workbook_sheets(workbook_xml: &str) -> Result<Vec<WorkbookSheetInfo>, XlsxError> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);

    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                sheets.push(sheet_info(&e)?);
            }
            Event::End(e) if e.local_name().as_ref() == b"sheets" => break,
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

fn sheet_info(e: &BytesStart<'_>) -> Result<WorkbookSheetInfo, XlsxError> {
    let mut name = None;
    let mut sheet_id = None;
    let mut rel_id = None;
    let mut visibility = SheetVisibility::Visible;

    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"name" => name = Some(value.into_owned()),
            b"sheetId" => {
                sheet_id = Some(value.parse::<u32>().map_err(|_| XlsxError::InvalidSheetId)?);
            }
            b"state" => visibility = SheetVisibility::from_state(&value),
            key if local_name(key) == b"id" => rel_id = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(WorkbookSheetInfo {
        name: name.ok_or(XlsxError::MissingAttr("name"))?,
        sheet_id: sheet_id.ok_or(XlsxError::MissingAttr("sheetId"))?,
        rel_id: rel_id.ok_or(XlsxError::MissingAttr("r:id"))?,
        visibility,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn parses_sheets_in_workbook_order() {
        let xml = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Data" sheetId="1" r:id="rId1"/>
    <sheet name="Pivot &amp; Co" sheetId="4" state="hidden" r:id="rId2"/>
  </sheets>
</workbook>"#;
        let sheets = parse_workbook_sheets(xml).unwrap();
        assert_eq!(
            sheets,
            vec![
                WorkbookSheetInfo {
                    name: "Data".to_string(),
                    sheet_id: 1,
                    rel_id: "rId1".to_string(),
                    visibility: SheetVisibility::Visible,
                },
                WorkbookSheetInfo {
                    name: "Pivot & Co".to_string(),
                    sheet_id: 4,
                    rel_id: "rId2".to_string(),
                    visibility: SheetVisibility::Hidden,
                },
            ]
        );
    }

    #[test]
    fn missing_rel_id_is_an_error() {
        let xml = r#"<workbook><sheets><sheet name="Data" sheetId="1"/></sheets></workbook>"#;
        assert!(matches!(
            parse_workbook_sheets(xml),
            Err(XlsxError::MissingAttr("r:id"))
        ));
    }
}
