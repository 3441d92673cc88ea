use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::package::XlsxError;

/// Relationship type URIs used across the crate.
pub mod rel_types {
    pub const WORKSHEET: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
    pub const SHARED_STRINGS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";
    pub const TABLE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/table";
    pub const PIVOT_TABLE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotTable";
    pub const PIVOT_CACHE_DEFINITION: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/pivotCacheDefinition";
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
}

/// Namespace of `r:id` attributes.
pub const RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const SPREADSHEETML_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: Option<String>,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode
            .as_deref()
            .is_some_and(|mode| mode.trim().eq_ignore_ascii_case("External"))
    }

    /// Part this relationship points at, or `None` for external targets.
    pub fn resolve(&self, source_part: &str) -> Option<String> {
        if self.is_external() {
            return None;
        }
        Some(resolve_target(source_part, &self.target))
    }
}

pub fn rels_part_name(part_name: &str) -> String {
    let part_name = part_name.strip_prefix('/').unwrap_or(part_name);
    let (dir, file) = part_name.rsplit_once('/').unwrap_or(("", part_name));
    if dir.is_empty() {
        format!("_rels/{file}.rels")
    } else {
        format!("{dir}/_rels/{file}.rels")
    }
}

/// Resolve a relationship `target` against the part that owns the relationship.
///
/// Targets starting with `/` are package-absolute. A `#fragment` is dropped, and an empty target
/// refers to the source part itself.
pub fn resolve_target(base_part: &str, target: &str) -> String {
    let target = target.split('#').next().unwrap_or_default();
    let base_part = base_part.trim_start_matches('/');
    if target.is_empty() {
        return base_part.to_string();
    }

    let mut segments: Vec<&str> = Vec::new();
    if !target.starts_with('/') {
        segments.extend(base_part.split('/'));
        // The source file name; targets are relative to its directory.
        segments.pop();
    }
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Relative relationship target from `source_part` to `target_part`, e.g.
/// `../pivotTables/pivotTable1.xml` from `xl/worksheets/sheet1.xml`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = source_part
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir.split('/').collect())
        .unwrap_or_default();
    let target: Vec<&str> = target_part.trim_start_matches('/').split('/').collect();

    let common = source_dir
        .iter()
        .zip(&target)
        .take_while(|(a, b)| a == b)
        .count()
        .min(target.len().saturating_sub(1));

    let mut segments = vec![".."; source_dir.len() - common];
    segments.extend(target[common..].iter().copied());
    segments.join("/")
}

/// All `<Relationship>` entries of a `.rels` part, in document order.
///
/// Attribute names are matched ASCII case-insensitively; entries lacking `Id`, `Type` or
/// `Target` are skipped.
pub fn parse_relationships(xml: &[u8]) -> Result<Vec<Relationship>, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e)
                if local_name(e.name().as_ref()).eq_ignore_ascii_case(b"Relationship") =>
            {
                relationships.extend(relationship_from(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

fn relationship_from(e: &BytesStart<'_>) -> Result<Option<Relationship>, XlsxError> {
    let mut fields: [Option<String>; 4] = Default::default();
    for attr in e.attributes() {
        let attr = attr?;
        let key = local_name(attr.key.as_ref());
        let slot = ["Id", "Type", "Target", "TargetMode"]
            .iter()
            .position(|name| key.eq_ignore_ascii_case(name.as_bytes()));
        if let Some(slot) = slot {
            fields[slot] = Some(attr.unescape_value()?.into_owned());
        }
    }
    let [id, type_uri, target, target_mode] = fields;
    Ok(match (id, type_uri, target) {
        (Some(id), Some(type_uri), Some(target)) => Some(Relationship {
            id,
            type_uri,
            target,
            target_mode,
        }),
        _ => None,
    })
}

pub fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|b| *b == b':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Lenient SpreadsheetML boolean: `1`/`true` and `0`/`false`.
pub(crate) fn parse_xml_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" => Some(true),
        "0" => Some(false),
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}
