use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader as XmlReader, Writer as XmlWriter};

use crate::openxml::local_name;
use crate::XlsxError;

pub const PIVOT_TABLE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.pivotTable+xml";
pub const PIVOT_CACHE_DEFINITION_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.pivotCacheDefinition+xml";

const DEFAULT_CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    "</Types>"
);

fn same_part_name(a: &str, b: &str) -> bool {
    a.trim_start_matches('/')
        .eq_ignore_ascii_case(b.trim_start_matches('/'))
}

fn override_element(part_name: &str, content_type: &str) -> BytesStart<'static> {
    let part_name = format!("/{}", part_name.trim_start_matches('/'));
    let mut el = BytesStart::new("Override");
    el.push_attribute(("PartName", part_name.as_str()));
    el.push_attribute(("ContentType", content_type));
    el
}

fn is_matching_override(e: &BytesStart<'_>, part_name: &str) -> Result<bool, XlsxError> {
    if !local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Override") {
        return Ok(false);
    }
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        if local_name(attr.key.as_ref()).eq_ignore_ascii_case(b"PartName") {
            return Ok(same_part_name(&attr.unescape_value()?, part_name));
        }
    }
    Ok(false)
}

/// Return `[Content_Types].xml` with an `<Override>` for `part_name`.
///
/// An existing override for the part is rewritten to `content_type`; otherwise one is appended.
/// When `existing` is `None` a minimal content types document is created.
pub fn ensure_content_types_override(
    existing: Option<&[u8]>,
    part_name: &str,
    content_type: &str,
) -> Result<Vec<u8>, XlsxError> {
    let existing = existing.unwrap_or(DEFAULT_CONTENT_TYPES_XML.as_bytes());

    let mut reader = XmlReader::from_reader(existing);
    reader.config_mut().trim_text(false);
    let mut writer = XmlWriter::new(Vec::with_capacity(existing.len() + 160));
    let mut buf = Vec::new();
    let mut found = false;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Empty(ref e) if is_matching_override(e, part_name)? => {
                found = true;
                writer.write_event(Event::Empty(override_element(part_name, content_type)))?;
            }
            Event::Start(ref e) if is_matching_override(e, part_name)? => {
                found = true;
                reader.read_to_end_into(e.name(), &mut Vec::new())?;
                writer.write_event(Event::Empty(override_element(part_name, content_type)))?;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"Types" => {
                let start = e.to_owned();
                let end = start.to_end().into_owned();
                writer.write_event(Event::Start(start))?;
                writer.write_event(Event::Empty(override_element(part_name, content_type)))?;
                writer.write_event(Event::End(end))?;
                found = true;
            }
            Event::End(ref e) if local_name(e.name().as_ref()) == b"Types" => {
                if !found {
                    writer.write_event(Event::Empty(override_element(part_name, content_type)))?;
                    found = true;
                }
                writer.write_event(Event::End(e.to_owned()))?;
            }
            Event::Eof => break,
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    if !found {
        return Err(XlsxError::Invalid(
            "[Content_Types].xml has no <Types> root".to_string(),
        ));
    }
    Ok(writer.into_inner())
}
