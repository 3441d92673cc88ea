use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::openxml::{parse_relationships, Relationship};
use crate::XlsxError;

const PACKAGE_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// The relationships of one source part (`*/_rels/*.rels`), editable in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    rels: Vec<Relationship>,
}

impl Relationships {
    pub fn new(rels: Vec<Relationship>) -> Self {
        Self { rels }
    }

    /// Parse an existing rels part. A missing part is an empty set.
    pub fn parse(xml: Option<&[u8]>) -> Result<Self, XlsxError> {
        match xml {
            Some(xml) => Ok(Self::new(parse_relationships(xml)?)),
            None => Ok(Self::default()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    pub fn of_type<'a>(&'a self, type_uri: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.rels.iter().filter(move |rel| rel.type_uri == type_uri)
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.rels.iter().find(|rel| rel.id == id)
    }

    pub fn len(&self) -> usize {
        self.rels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// One past the highest numeric `rId{n}` in use.
    pub fn next_r_id(&self) -> String {
        let max = self
            .rels
            .iter()
            .filter_map(|rel| rel.id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("rId{}", max + 1)
    }

    /// Append an internal relationship and return its newly allocated id.
    pub fn add(&mut self, type_uri: &str, target: &str) -> String {
        let id = self.next_r_id();
        self.rels.push(Relationship {
            id: id.clone(),
            type_uri: type_uri.to_string(),
            target: target.to_string(),
            target_mode: None,
        });
        id
    }

    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let idx = self.rels.iter().position(|rel| rel.id == id)?;
        Some(self.rels.remove(idx))
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, XlsxError> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        writer.get_mut().push(b'\n');

        let mut root = BytesStart::new("Relationships");
        root.push_attribute(("xmlns", PACKAGE_RELATIONSHIPS_NS));
        if self.rels.is_empty() {
            writer.write_event(Event::Empty(root))?;
            return Ok(writer.into_inner());
        }

        writer.write_event(Event::Start(root))?;
        for rel in &self.rels {
            let mut el = BytesStart::new("Relationship");
            el.push_attribute(("Id", rel.id.as_str()));
            el.push_attribute(("Type", rel.type_uri.as_str()));
            el.push_attribute(("Target", rel.target.as_str()));
            if let Some(mode) = &rel.target_mode {
                el.push_attribute(("TargetMode", mode.as_str()));
            }
            writer.write_event(Event::Empty(el))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
        Ok(writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use roxmltree::Document;

    use crate::openxml::rel_types;

    const RELS: &[u8] = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
  <Relationship Id="custom" Type="urn:example" Target="https://example.com/x" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn next_id_skips_past_highest_numeric_id() {
        let mut rels = Relationships::parse(Some(RELS)).unwrap();
        assert_eq!(rels.next_r_id(), "rId8");
        let id = rels.add(rel_types::PIVOT_CACHE_DEFINITION, "pivotCache/pivotCacheDefinition1.xml");
        assert_eq!(id, "rId8");
        assert_eq!(rels.next_r_id(), "rId9");
        assert_eq!(Relationships::default().next_r_id(), "rId1");
    }

    #[test]
    fn rewrite_preserves_entries_and_target_mode() {
        let mut rels = Relationships::parse(Some(RELS)).unwrap();
        rels.remove("rId7").expect("rId7 present");
        let xml = rels.to_xml().unwrap();
        let xml = std::str::from_utf8(&xml).unwrap();

        let doc = Document::parse(xml).unwrap();
        let ids: Vec<&str> = doc
            .descendants()
            .filter(|n| n.has_tag_name("Relationship"))
            .filter_map(|n| n.attribute("Id"))
            .collect();
        assert_eq!(ids, vec!["rId1", "custom"]);

        let reparsed = Relationships::parse(Some(xml.as_bytes())).unwrap();
        assert_eq!(reparsed, rels);
        assert!(reparsed.get("custom").is_some_and(|r| r.is_external()));
    }

    #[test]
    fn empty_set_writes_self_closing_root() {
        let xml = Relationships::default().to_xml().unwrap();
        let xml = String::from_utf8(xml).unwrap();
        assert!(xml.ends_with(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#
        ));
        assert!(Relationships::parse(Some(xml.as_bytes())).unwrap().is_empty());
    }
}
