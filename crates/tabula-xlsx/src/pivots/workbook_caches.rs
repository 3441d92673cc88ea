use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::openxml::{local_name, RELATIONSHIPS_NS};
use crate::XlsxError;

/// Children of `<workbook>` that follow `<pivotCaches>` in schema order.
const AFTER_PIVOT_CACHES: &[&[u8]] = &[
    b"smartTagPr",
    b"smartTagTypes",
    b"webPublishing",
    b"fileRecoveryPr",
    b"webPublishObjects",
    b"extLst",
];

/// A `<pivotCache>` registration in `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkbookPivotCache {
    pub cache_id: u32,
    /// Workbook relationship id of the cache definition part.
    pub rel_id: String,
}

fn parse_pivot_cache(e: &BytesStart<'_>) -> Result<Option<WorkbookPivotCache>, XlsxError> {
    let mut cache_id = None;
    let mut rel_id = None;
    for attr in e.attributes().with_checks(false) {
        let attr = attr?;
        let key = local_name(attr.key.as_ref());
        if key.eq_ignore_ascii_case(b"cacheId") {
            cache_id = attr.unescape_value()?.trim().parse::<u32>().ok();
        } else if key.eq_ignore_ascii_case(b"id") {
            rel_id = Some(attr.unescape_value()?.into_owned());
        }
    }
    Ok(cache_id
        .zip(rel_id)
        .map(|(cache_id, rel_id)| WorkbookPivotCache { cache_id, rel_id }))
}

pub fn parse_workbook_pivot_caches(xml: &[u8]) -> Result<Vec<WorkbookPivotCache>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut caches = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"pivotCache") =>
            {
                if let Some(cache) = parse_pivot_cache(&e)? {
                    caches.push(cache);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(caches)
}

/// Namespace prefixes declared on the workbook root.
#[derive(Debug, Default)]
struct RootPrefixes {
    /// Prefix of the `<workbook>` element itself, e.g. `x` for `<x:workbook>`.
    element: Option<String>,
    /// Prefix bound to the office relationships namespace, if any.
    relationships: Option<String>,
}

impl RootPrefixes {
    fn read(e: &BytesStart<'_>) -> Result<Self, XlsxError> {
        let name = e.name();
        let element = name
            .as_ref()
            .iter()
            .position(|b| *b == b':')
            .map(|idx| String::from_utf8_lossy(&name.as_ref()[..idx]).into_owned());
        let mut relationships = None;
        for attr in e.attributes().with_checks(false) {
            let attr = attr?;
            if let Some(prefix) = attr.key.as_ref().strip_prefix(b"xmlns:") {
                if attr.unescape_value()? == RELATIONSHIPS_NS {
                    relationships = Some(String::from_utf8_lossy(prefix).into_owned());
                }
            }
        }
        Ok(Self {
            element,
            relationships,
        })
    }

    fn qualify(&self, local: &str) -> String {
        match &self.element {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    fn pivot_caches_element(&self, cache_id: u32, rel_id: &str) -> Vec<Event<'static>> {
        let tag = self.qualify("pivotCaches");
        let mut start = BytesStart::new(tag.clone());
        let r = match &self.relationships {
            Some(prefix) => prefix.clone(),
            None => {
                start.push_attribute(("xmlns:r", RELATIONSHIPS_NS));
                "r".to_string()
            }
        };
        vec![
            Event::Start(start),
            Event::Empty(self.pivot_cache_element(cache_id, rel_id, &r)),
            Event::End(BytesEnd::new(tag)),
        ]
    }

    fn pivot_cache_element(&self, cache_id: u32, rel_id: &str, r: &str) -> BytesStart<'static> {
        let mut el = BytesStart::new(self.qualify("pivotCache"));
        el.push_attribute(("cacheId", cache_id.to_string().as_str()));
        el.push_attribute((format!("{r}:id").as_str(), rel_id));
        el
    }
}

/// Register the cache definition behind `rel_id` in the workbook's `<pivotCaches>`.
///
/// Returns the rewritten workbook and the new `cacheId`, one past the highest id in use.
pub(crate) fn add_workbook_pivot_cache(
    workbook_xml: &[u8],
    rel_id: &str,
) -> Result<(Vec<u8>, u32), XlsxError> {
    let cache_id = parse_workbook_pivot_caches(workbook_xml)?
        .iter()
        .map(|c| c.cache_id)
        .max()
        .unwrap_or(0)
        + 1;

    let mut reader = Reader::from_reader(Cursor::new(workbook_xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len() + 128));
    let mut buf = Vec::new();

    let mut prefixes: Option<RootPrefixes> = None;
    let mut depth = 0usize;
    let mut inserted = false;
    // A `<pivotCaches>` element whose registration is still owed, with the `r` prefix it sees.
    let mut in_pivot_caches: Option<String> = None;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) if depth == 0 => {
                prefixes = Some(RootPrefixes::read(e)?);
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::Start(ref e)
                if depth == 1 && !inserted && local_name(e.name().as_ref()) == b"pivotCaches" =>
            {
                let root = prefixes.as_ref().ok_or_else(missing_root)?;
                let r = RootPrefixes::read(e)?
                    .relationships
                    .or_else(|| root.relationships.clone());
                in_pivot_caches = Some(r.ok_or_else(|| {
                    XlsxError::Invalid("pivotCaches has no relationships namespace".to_string())
                })?);
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::Empty(ref e)
                if depth == 1 && !inserted && local_name(e.name().as_ref()) == b"pivotCaches" =>
            {
                let root = prefixes.as_ref().ok_or_else(missing_root)?;
                for ev in root.pivot_caches_element(cache_id, rel_id) {
                    writer.write_event(ev)?;
                }
                inserted = true;
            }
            Event::End(ref e) if depth == 2 && in_pivot_caches.is_some() => {
                if let (Some(r), Some(root)) = (in_pivot_caches.take(), prefixes.as_ref()) {
                    writer.write_event(Event::Empty(root.pivot_cache_element(cache_id, rel_id, &r)))?;
                    inserted = true;
                }
                depth -= 1;
                writer.write_event(Event::End(e.borrow()))?;
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if depth == 1
                    && !inserted
                    && AFTER_PIVOT_CACHES.contains(&local_name(e.name().as_ref())) =>
            {
                let root = prefixes.as_ref().ok_or_else(missing_root)?;
                for ev in root.pivot_caches_element(cache_id, rel_id) {
                    writer.write_event(ev)?;
                }
                inserted = true;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
                writer.write_event(event.borrow())?;
            }
            Event::End(_) if depth == 1 && !inserted => {
                let root = prefixes.as_ref().ok_or_else(missing_root)?;
                for ev in root.pivot_caches_element(cache_id, rel_id) {
                    writer.write_event(ev)?;
                }
                inserted = true;
                depth -= 1;
                writer.write_event(event.borrow())?;
            }
            Event::Start(_) => {
                depth += 1;
                writer.write_event(event.borrow())?;
            }
            Event::End(_) => {
                depth = depth.saturating_sub(1);
                writer.write_event(event.borrow())?;
            }
            Event::Eof => break,
            _ => writer.write_event(event.borrow())?,
        }
        buf.clear();
    }

    if !inserted {
        return Err(missing_root());
    }
    log::debug!("registered pivot cache {cache_id} as {rel_id}");
    Ok((writer.into_inner(), cache_id))
}

fn missing_root() -> XlsxError {
    XlsxError::Invalid("workbook.xml has no <workbook> root".to_string())
}

/// Drop the `<pivotCache>` registered under `rel_id`, and `<pivotCaches>` once it is empty.
pub(crate) fn remove_workbook_pivot_cache(
    workbook_xml: &[u8],
    rel_id: &str,
) -> Result<Vec<u8>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(workbook_xml));
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::with_capacity(workbook_xml.len()));
    let mut buf = Vec::new();

    // Events of the open `<pivotCaches>` element, held back until we know it stays non-empty.
    let mut held: Option<Vec<Event<'static>>> = None;
    let mut kept = 0usize;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        match event {
            Event::Start(ref e) if local_name(e.name().as_ref()) == b"pivotCaches" => {
                held = Some(vec![event.clone().into_owned()]);
                kept = 0;
            }
            Event::Empty(ref e) if local_name(e.name().as_ref()) == b"pivotCaches" => {}
            Event::End(ref e) if local_name(e.name().as_ref()) == b"pivotCaches" => {
                if let Some(mut events) = held.take() {
                    if kept > 0 {
                        events.push(event.clone().into_owned());
                        for ev in events {
                            writer.write_event(ev)?;
                        }
                    }
                }
            }
            Event::Start(ref e) | Event::Empty(ref e)
                if held.is_some() && local_name(e.name().as_ref()) == b"pivotCache" =>
            {
                let removed = parse_pivot_cache(e)?.is_some_and(|c| c.rel_id == rel_id);
                if removed {
                    if matches!(event, Event::Start(_)) {
                        reader.read_to_end_into(e.name(), &mut Vec::new())?;
                    }
                } else if let Some(events) = held.as_mut() {
                    kept += 1;
                    events.push(event.clone().into_owned());
                }
            }
            Event::Eof => break,
            _ => match held.as_mut() {
                Some(events) => events.push(event.clone().into_owned()),
                None => writer.write_event(event.borrow())?,
            },
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets><calcPr calcId="191029"/><extLst><ext uri="{x}"/></extLst></workbook>"#;

    fn child_names(xml: &[u8]) -> Vec<String> {
        let xml = std::str::from_utf8(xml).unwrap();
        let doc = roxmltree::Document::parse(xml).unwrap();
        doc.root_element()
            .children()
            .filter(|n| n.is_element())
            .map(|n| n.tag_name().name().to_string())
            .collect()
    }

    #[test]
    fn inserts_pivot_caches_before_ext_lst() {
        let (xml, cache_id) = add_workbook_pivot_cache(WORKBOOK.as_bytes(), "rId5").unwrap();
        assert_eq!(cache_id, 1);
        assert_eq!(
            child_names(&xml),
            vec!["sheets", "calcPr", "pivotCaches", "extLst"]
        );
        assert_eq!(
            parse_workbook_pivot_caches(&xml).unwrap(),
            vec![WorkbookPivotCache {
                cache_id: 1,
                rel_id: "rId5".to_string()
            }]
        );
        assert!(!std::str::from_utf8(&xml).unwrap().contains("<pivotCaches xmlns:r"));
    }

    #[test]
    fn appends_to_existing_registrations() {
        let (xml, _) = add_workbook_pivot_cache(WORKBOOK.as_bytes(), "rId5").unwrap();
        let (xml, second) = add_workbook_pivot_cache(&xml, "rId6").unwrap();
        assert_eq!(second, 2);
        let caches = parse_workbook_pivot_caches(&xml).unwrap();
        assert_eq!(caches.len(), 2);
        assert_eq!(caches[1].rel_id, "rId6");
        assert_eq!(
            child_names(&xml).iter().filter(|n| *n == "pivotCaches").count(),
            1
        );
    }

    #[test]
    fn declares_relationships_namespace_when_root_lacks_it() {
        let workbook = r#"<x:workbook xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><x:sheets/></x:workbook>"#;
        let (xml, _) = add_workbook_pivot_cache(workbook.as_bytes(), "rId2").unwrap();
        let text = std::str::from_utf8(&xml).unwrap();
        assert!(text.contains(r#"<x:pivotCaches xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><x:pivotCache cacheId="1" r:id="rId2"/></x:pivotCaches>"#));
        assert_eq!(child_names(&xml), vec!["sheets", "pivotCaches"]);
    }

    #[test]
    fn removal_drops_the_entry_then_the_container() {
        let (xml, _) = add_workbook_pivot_cache(WORKBOOK.as_bytes(), "rId5").unwrap();
        let (xml, _) = add_workbook_pivot_cache(&xml, "rId6").unwrap();

        let xml = remove_workbook_pivot_cache(&xml, "rId5").unwrap();
        assert_eq!(
            parse_workbook_pivot_caches(&xml).unwrap(),
            vec![WorkbookPivotCache {
                cache_id: 2,
                rel_id: "rId6".to_string()
            }]
        );

        let xml = remove_workbook_pivot_cache(&xml, "rId6").unwrap();
        assert_eq!(child_names(&xml), vec!["sheets", "calcPr", "extLst"]);
    }
}
