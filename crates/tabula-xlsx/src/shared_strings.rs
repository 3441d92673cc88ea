use quick_xml::events::Event;
use quick_xml::Reader;

use crate::openxml::{local_name, rel_types, rels_part_name};
use crate::package::WORKBOOK_PART;
use crate::relationships::Relationships;
use crate::{XlsxError, XlsxPackage};

/// Plain text of every `<si>` in a shared strings part, in index order.
///
/// Rich text runs are concatenated; phonetic runs (`<rPh>`) are skipped.
pub fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, XlsxError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"si" => current = Some(String::new()),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_t = true,
                _ => {}
            },
            Event::Empty(e) if local_name(e.name().as_ref()) == b"si" => out.push(String::new()),
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"si" => out.push(current.take().unwrap_or_default()),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(e) if in_t => {
                if let Some(current) = current.as_mut() {
                    current.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) if in_t => {
                if let Some(current) = current.as_mut() {
                    current.push_str(std::str::from_utf8(e.as_ref())?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(out)
}

fn shared_strings_part_name(package: &XlsxPackage) -> Result<Option<String>, XlsxError> {
    let rels = Relationships::parse(package.part(&rels_part_name(WORKBOOK_PART)))?;
    let from_rels = rels
        .of_type(rel_types::SHARED_STRINGS)
        .filter_map(|rel| rel.resolve(WORKBOOK_PART))
        .find(|target| package.part(target).is_some());
    Ok(from_rels.or_else(|| {
        package
            .part("xl/sharedStrings.xml")
            .map(|_| "xl/sharedStrings.xml".to_string())
    }))
}

/// Load the workbook's shared string table; empty when the package has none.
pub fn load_shared_strings(package: &XlsxPackage) -> Result<Vec<String>, XlsxError> {
    let Some(part) = shared_strings_part_name(package)? else {
        return Ok(Vec::new());
    };
    match package.part(&part) {
        Some(bytes) => parse_shared_strings(bytes),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn rich_runs_concatenate_and_phonetics_are_skipped() {
        let xml = br#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
  <si><t>Month</t></si>
  <si><r><t>Sa</t></r><r><rPr><b/></rPr><t>les</t></r></si>
  <si><t>&#26481;&#20140;</t><rPh sb="0" eb="2"><t>TOKYO</t></rPh></si>
  <si/>
</sst>"#;
        assert_eq!(
            parse_shared_strings(xml).unwrap(),
            vec!["Month", "Sales", "東京", ""]
        );
    }
}
