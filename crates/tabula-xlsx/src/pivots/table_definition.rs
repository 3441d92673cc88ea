use std::collections::BTreeMap;
use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use tabula_model::pivots::{PivotTableField, PivotTableOptions, SubtotalFunction};
use tabula_model::Range;

use crate::openxml::{local_name, parse_xml_bool, SPREADSHEETML_NS};
use crate::XlsxError;

use super::{
    PIVOT_CREATED_VERSION, PIVOT_DATA_CAPTION, PIVOT_MIN_REFRESHABLE_VERSION,
    PIVOT_REFRESHED_VERSION,
};

/// `field x` value standing for the synthetic values field.
const VALUES_FIELD_INDEX: i64 = -2;

/// Boolean attributes present on an element, keyed by attribute name.
///
/// Absent attributes are omitted; readers fall back to the schema default through the
/// matching [`FlagMapping`].
pub type XmlFlags = BTreeMap<&'static str, bool>;

/// One boolean XML attribute and the option field it carries.
pub(crate) struct FlagMapping<T> {
    pub(crate) attr: &'static str,
    pub(crate) get: fn(&T) -> bool,
    pub(crate) set: fn(&mut T, bool),
    /// Value an absent attribute has according to the schema.
    pub(crate) schema_default: bool,
}

impl<T> FlagMapping<T> {
    fn find<'a>(mappings: &'a [FlagMapping<T>], attr: &[u8]) -> Option<&'a FlagMapping<T>> {
        mappings.iter().find(|m| m.attr.as_bytes() == attr)
    }
}

/// Every attribute in `mappings`, taken from `value`.
pub(crate) fn flags_from<T>(mappings: &[FlagMapping<T>], value: &T) -> XmlFlags {
    mappings.iter().map(|m| (m.attr, (m.get)(value))).collect()
}

/// Copy `flags` onto `target`; attributes missing from `flags` take their schema default.
pub(crate) fn apply_flags<T>(mappings: &[FlagMapping<T>], flags: &XmlFlags, target: &mut T) {
    for m in mappings {
        (m.set)(target, flags.get(m.attr).copied().unwrap_or(m.schema_default));
    }
}

/// `pivotTableDefinition` attributes.
pub(crate) const TABLE_FLAGS: &[FlagMapping<PivotTableOptions>] = &[
    FlagMapping {
        attr: "rowGrandTotals",
        get: |o| o.row_grand_totals,
        set: |o, v| o.row_grand_totals = v,
        schema_default: true,
    },
    FlagMapping {
        attr: "colGrandTotals",
        get: |o| o.col_grand_totals,
        set: |o, v| o.col_grand_totals = v,
        schema_default: true,
    },
    FlagMapping {
        attr: "showDrill",
        get: |o| o.show_drill,
        set: |o, v| o.show_drill = v,
        schema_default: true,
    },
    FlagMapping {
        attr: "useAutoFormatting",
        get: |o| o.use_auto_formatting,
        set: |o, v| o.use_auto_formatting = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "pageOverThenDown",
        get: |o| o.page_over_then_down,
        set: |o, v| o.page_over_then_down = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "mergeItem",
        get: |o| o.merge_item,
        set: |o, v| o.merge_item = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "compactData",
        get: |o| o.compact_data,
        set: |o, v| o.compact_data = v,
        schema_default: true,
    },
    FlagMapping {
        attr: "showError",
        get: |o| o.show_error,
        set: |o, v| o.show_error = v,
        schema_default: false,
    },
];

/// `pivotTableStyleInfo` attributes.
pub(crate) const STYLE_FLAGS: &[FlagMapping<PivotTableOptions>] = &[
    FlagMapping {
        attr: "showRowHeaders",
        get: |o| o.show_row_headers,
        set: |o, v| o.show_row_headers = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "showColHeaders",
        get: |o| o.show_col_headers,
        set: |o, v| o.show_col_headers = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "showRowStripes",
        get: |o| o.show_row_stripes,
        set: |o, v| o.show_row_stripes = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "showColStripes",
        get: |o| o.show_col_stripes,
        set: |o, v| o.show_col_stripes = v,
        schema_default: false,
    },
    FlagMapping {
        attr: "showLastColumn",
        get: |o| o.show_last_column,
        set: |o, v| o.show_last_column = v,
        schema_default: false,
    },
];

/// `pivotField` attributes of row and column fields.
pub(crate) const FIELD_FLAGS: &[FlagMapping<PivotTableField>] = &[
    FlagMapping {
        attr: "compact",
        get: |f| f.compact,
        set: |f, v| f.compact = v,
        schema_default: true,
    },
    FlagMapping {
        attr: "outline",
        get: |f| f.outline,
        set: |f, v| f.outline = v,
        schema_default: true,
    },
    FlagMapping {
        attr: "defaultSubtotal",
        get: |f| f.default_subtotal,
        set: |f, v| f.default_subtotal = v,
        schema_default: true,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotAxis {
    Row,
    Column,
    Page,
    Values,
}

impl PivotAxis {
    pub const fn xml_name(self) -> &'static str {
        match self {
            PivotAxis::Row => "axisRow",
            PivotAxis::Column => "axisCol",
            PivotAxis::Page => "axisPage",
            PivotAxis::Values => "axisValues",
        }
    }

    pub fn from_xml_name(name: &str) -> Option<Self> {
        match name {
            "axisRow" => Some(PivotAxis::Row),
            "axisCol" => Some(PivotAxis::Column),
            "axisPage" => Some(PivotAxis::Page),
            "axisValues" => Some(PivotAxis::Values),
            _ => None,
        }
    }
}

/// An `<item>` of a pivot field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotItem {
    /// `t="default"`: the automatic subtotal.
    Default,
    /// `x="N"`: shared item index.
    Index(u32),
}

/// One `<pivotField>`, positionally matching a cache field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotFieldDef {
    pub name: Option<String>,
    pub axis: Option<PivotAxis>,
    pub data_field: bool,
    pub flags: XmlFlags,
    pub items: Vec<PivotItem>,
}

/// A `colFields` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColField {
    Field(u32),
    /// The values pseudo-field, present when a table has several data fields.
    Values,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageField {
    pub fld: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    pub name: Option<String>,
    pub fld: u32,
    pub subtotal: SubtotalFunction,
}

/// A `pivotTableDefinition` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTableDefinition {
    pub name: String,
    pub cache_id: u32,
    pub data_caption: String,
    /// Target range on the hosting sheet.
    pub location: Range,
    pub flags: XmlFlags,
    pub style_name: Option<String>,
    pub style_flags: XmlFlags,
    pub pivot_fields: Vec<PivotFieldDef>,
    pub row_fields: Vec<u32>,
    pub col_fields: Vec<ColField>,
    pub page_fields: Vec<PageField>,
    pub data_fields: Vec<DataField>,
}

fn bool_attr(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

fn push_flags(el: &mut BytesStart<'_>, mappings_order: &[&'static str], flags: &XmlFlags) {
    for attr in mappings_order {
        if let Some(value) = flags.get(attr) {
            el.push_attribute((*attr, bool_attr(*value)));
        }
    }
}

fn attr_order<T>(mappings: &[FlagMapping<T>]) -> Vec<&'static str> {
    mappings.iter().map(|m| m.attr).collect()
}

fn write_counted<W: std::io::Write>(
    writer: &mut Writer<W>,
    tag: &str,
    children: Vec<BytesStart<'static>>,
) -> Result<(), XlsxError> {
    let mut start = BytesStart::new(tag);
    start.push_attribute(("count", children.len().to_string().as_str()));
    writer.write_event(Event::Start(start))?;
    for child in children {
        writer.write_event(Event::Empty(child))?;
    }
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn field_element(x: i64) -> BytesStart<'static> {
    let mut el = BytesStart::new("field");
    el.push_attribute(("x", x.to_string().as_str()));
    el
}

fn write_pivot_field<W: std::io::Write>(
    writer: &mut Writer<W>,
    field: &PivotFieldDef,
) -> Result<(), XlsxError> {
    let mut el = BytesStart::new("pivotField");
    if let Some(name) = field.name.as_deref().filter(|n| !n.is_empty()) {
        el.push_attribute(("name", name));
    }
    if let Some(axis) = field.axis {
        el.push_attribute(("axis", axis.xml_name()));
    }
    if field.data_field {
        el.push_attribute(("dataField", "1"));
    }
    push_flags(&mut el, &attr_order(FIELD_FLAGS), &field.flags);

    if field.items.is_empty() {
        writer.write_event(Event::Empty(el))?;
        return Ok(());
    }
    writer.write_event(Event::Start(el))?;
    let items = field
        .items
        .iter()
        .map(|item| {
            let mut el = BytesStart::new("item");
            match item {
                PivotItem::Default => el.push_attribute(("t", "default")),
                PivotItem::Index(x) => el.push_attribute(("x", x.to_string().as_str())),
            }
            el
        })
        .collect();
    write_counted(writer, "items", items)?;
    writer.write_event(Event::End(BytesEnd::new("pivotField")))?;
    Ok(())
}

/// Serialize a new pivot table definition.
///
/// Row and column items are written as the minimal placeholder Excel expects before its first
/// refresh: one row item with two `<x/>` children and one empty column item.
pub fn write_pivot_table_definition_xml(def: &PivotTableDefinition) -> Result<Vec<u8>, XlsxError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    writer.get_mut().push(b'\n');

    let mut root = BytesStart::new("pivotTableDefinition");
    root.push_attribute(("xmlns", SPREADSHEETML_NS));
    root.push_attribute(("name", def.name.as_str()));
    root.push_attribute(("cacheId", def.cache_id.to_string().as_str()));
    root.push_attribute(("dataCaption", def.data_caption.as_str()));
    root.push_attribute((
        "updatedVersion",
        PIVOT_REFRESHED_VERSION.to_string().as_str(),
    ));
    root.push_attribute((
        "minRefreshableVersion",
        PIVOT_MIN_REFRESHABLE_VERSION.to_string().as_str(),
    ));
    root.push_attribute(("createdVersion", PIVOT_CREATED_VERSION.to_string().as_str()));
    push_flags(&mut root, &attr_order(TABLE_FLAGS), &def.flags);
    writer.write_event(Event::Start(root))?;

    let mut location = BytesStart::new("location");
    location.push_attribute(("ref", def.location.to_string().as_str()));
    location.push_attribute(("firstHeaderRow", "1"));
    location.push_attribute(("firstDataRow", "1"));
    location.push_attribute(("firstDataCol", "1"));
    writer.write_event(Event::Empty(location))?;

    let mut pivot_fields = BytesStart::new("pivotFields");
    pivot_fields.push_attribute(("count", def.pivot_fields.len().to_string().as_str()));
    writer.write_event(Event::Start(pivot_fields))?;
    for field in &def.pivot_fields {
        write_pivot_field(&mut writer, field)?;
    }
    writer.write_event(Event::End(BytesEnd::new("pivotFields")))?;

    if !def.row_fields.is_empty() {
        let fields = def
            .row_fields
            .iter()
            .map(|x| field_element(i64::from(*x)))
            .collect();
        write_counted(&mut writer, "rowFields", fields)?;
    }

    let mut row_items = BytesStart::new("rowItems");
    row_items.push_attribute(("count", "1"));
    writer.write_event(Event::Start(row_items))?;
    writer.write_event(Event::Start(BytesStart::new("i")))?;
    writer.write_event(Event::Empty(BytesStart::new("x")))?;
    writer.write_event(Event::Empty(BytesStart::new("x")))?;
    writer.write_event(Event::End(BytesEnd::new("i")))?;
    writer.write_event(Event::End(BytesEnd::new("rowItems")))?;

    if !def.col_fields.is_empty() {
        let fields = def
            .col_fields
            .iter()
            .map(|field| match field {
                ColField::Field(x) => field_element(i64::from(*x)),
                ColField::Values => field_element(VALUES_FIELD_INDEX),
            })
            .collect();
        write_counted(&mut writer, "colFields", fields)?;
    }

    let mut col_items = BytesStart::new("colItems");
    col_items.push_attribute(("count", "1"));
    writer.write_event(Event::Start(col_items))?;
    writer.write_event(Event::Empty(BytesStart::new("i")))?;
    writer.write_event(Event::End(BytesEnd::new("colItems")))?;

    if !def.page_fields.is_empty() {
        let fields = def
            .page_fields
            .iter()
            .map(|page| {
                let mut el = BytesStart::new("pageField");
                el.push_attribute(("fld", page.fld.to_string().as_str()));
                if let Some(name) = page.name.as_deref().filter(|n| !n.is_empty()) {
                    el.push_attribute(("name", name));
                }
                el
            })
            .collect();
        write_counted(&mut writer, "pageFields", fields)?;
    }

    if !def.data_fields.is_empty() {
        let fields = def
            .data_fields
            .iter()
            .map(|data| {
                let mut el = BytesStart::new("dataField");
                if let Some(name) = data.name.as_deref().filter(|n| !n.is_empty()) {
                    el.push_attribute(("name", name));
                }
                el.push_attribute(("fld", data.fld.to_string().as_str()));
                el.push_attribute(("subtotal", data.subtotal.xml_name()));
                el
            })
            .collect();
        write_counted(&mut writer, "dataFields", fields)?;
    }

    let mut style = BytesStart::new("pivotTableStyleInfo");
    if let Some(name) = def.style_name.as_deref() {
        style.push_attribute(("name", name));
    }
    push_flags(&mut style, &attr_order(STYLE_FLAGS), &def.style_flags);
    writer.write_event(Event::Empty(style))?;

    writer.write_event(Event::End(BytesEnd::new("pivotTableDefinition")))?;
    Ok(writer.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    PivotFields,
    RowFields,
    ColFields,
}

#[derive(Debug, Default)]
struct DefinitionBuilder {
    saw_root: bool,
    name: Option<String>,
    cache_id: Option<u32>,
    data_caption: Option<String>,
    location: Option<Range>,
    flags: XmlFlags,
    style_name: Option<String>,
    style_flags: XmlFlags,
    pivot_fields: Vec<PivotFieldDef>,
    row_fields: Vec<u32>,
    col_fields: Vec<ColField>,
    page_fields: Vec<PageField>,
    data_fields: Vec<DataField>,
}

fn parse_u32(attr: &str, value: &str) -> Result<u32, XlsxError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| XlsxError::Invalid(format!("invalid {attr} value {value:?}")))
}

fn collect_flag<T>(mappings: &[FlagMapping<T>], flags: &mut XmlFlags, key: &[u8], value: &str) {
    if let Some(mapping) = FlagMapping::find(mappings, key) {
        match parse_xml_bool(value) {
            Some(v) => {
                flags.insert(mapping.attr, v);
            }
            None => log::warn!("ignoring invalid {} value {value:?}", mapping.attr),
        }
    }
}

impl DefinitionBuilder {
    fn start_element(&mut self, e: &BytesStart<'_>, section: Section) -> Result<(), XlsxError> {
        let name = e.name();
        let tag = local_name(name.as_ref());

        if !self.saw_root {
            if tag != b"pivotTableDefinition" {
                return Err(XlsxError::Invalid(format!(
                    "expected pivotTableDefinition root, found {}",
                    String::from_utf8_lossy(tag)
                )));
            }
            self.saw_root = true;
            for attr in e.attributes().with_checks(false) {
                let attr = attr?;
                let key = local_name(attr.key.as_ref());
                let value = attr.unescape_value()?;
                match key {
                    b"name" => self.name = Some(value.into_owned()),
                    b"cacheId" => self.cache_id = Some(parse_u32("cacheId", &value)?),
                    b"dataCaption" => self.data_caption = Some(value.into_owned()),
                    _ => collect_flag(TABLE_FLAGS, &mut self.flags, key, &value),
                }
            }
            return Ok(());
        }

        match (tag, section) {
            (b"location", _) => {
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    if local_name(attr.key.as_ref()) == b"ref" {
                        let value = attr.unescape_value()?;
                        let range = Range::from_a1(&value).map_err(|err| {
                            XlsxError::Invalid(format!("invalid location ref {value:?}: {err}"))
                        })?;
                        self.location = Some(range);
                    }
                }
            }
            (b"pivotField", Section::PivotFields) => {
                let mut field = PivotFieldDef::default();
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    let key = local_name(attr.key.as_ref());
                    let value = attr.unescape_value()?;
                    match key {
                        b"name" => field.name = Some(value.into_owned()),
                        b"axis" => {
                            field.axis = PivotAxis::from_xml_name(&value);
                            if field.axis.is_none() {
                                log::warn!("ignoring unknown pivot field axis {value:?}");
                            }
                        }
                        b"dataField" => field.data_field = parse_xml_bool(&value).unwrap_or(false),
                        _ => collect_flag(FIELD_FLAGS, &mut field.flags, key, &value),
                    }
                }
                self.pivot_fields.push(field);
            }
            (b"item", Section::PivotFields) => {
                let mut item = None;
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    let value = attr.unescape_value()?;
                    match local_name(attr.key.as_ref()) {
                        b"t" if value == "default" => item = Some(PivotItem::Default),
                        b"x" => item = Some(PivotItem::Index(parse_u32("item x", &value)?)),
                        _ => {}
                    }
                }
                if let (Some(item), Some(field)) = (item, self.pivot_fields.last_mut()) {
                    field.items.push(item);
                }
            }
            (b"field", Section::RowFields | Section::ColFields) => {
                let mut x = None;
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    if local_name(attr.key.as_ref()) == b"x" {
                        let value = attr.unescape_value()?;
                        x = Some(value.trim().parse::<i64>().map_err(|_| {
                            XlsxError::Invalid(format!("invalid field x value {value:?}"))
                        })?);
                    }
                }
                let x = x.ok_or(XlsxError::MissingAttr("x"))?;
                match (section, u32::try_from(x)) {
                    (Section::RowFields, Ok(idx)) => self.row_fields.push(idx),
                    (Section::ColFields, Ok(idx)) => self.col_fields.push(ColField::Field(idx)),
                    (Section::ColFields, Err(_)) if x == VALUES_FIELD_INDEX => {
                        self.col_fields.push(ColField::Values)
                    }
                    (Section::RowFields, Err(_)) if x == VALUES_FIELD_INDEX => {
                        log::debug!("values field placed on rows");
                    }
                    _ => return Err(XlsxError::Invalid(format!("invalid field index {x}"))),
                }
            }
            (b"pageField", _) => {
                let mut fld = None;
                let mut name = None;
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    let value = attr.unescape_value()?;
                    match local_name(attr.key.as_ref()) {
                        b"fld" => fld = Some(parse_u32("pageField fld", &value)?),
                        b"name" => name = Some(value.into_owned()),
                        _ => {}
                    }
                }
                self.page_fields.push(PageField {
                    fld: fld.ok_or(XlsxError::MissingAttr("fld"))?,
                    name,
                });
            }
            (b"dataField", _) => {
                let mut fld = None;
                let mut name = None;
                let mut subtotal = SubtotalFunction::Sum;
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    let value = attr.unescape_value()?;
                    match local_name(attr.key.as_ref()) {
                        b"fld" => fld = Some(parse_u32("dataField fld", &value)?),
                        b"name" => name = Some(value.into_owned()),
                        b"subtotal" => subtotal = SubtotalFunction::from_name_or_sum(&value),
                        _ => {}
                    }
                }
                self.data_fields.push(DataField {
                    name,
                    fld: fld.ok_or(XlsxError::MissingAttr("fld"))?,
                    subtotal,
                });
            }
            (b"pivotTableStyleInfo", _) => {
                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    let key = local_name(attr.key.as_ref());
                    let value = attr.unescape_value()?;
                    match key {
                        b"name" => self.style_name = Some(value.into_owned()),
                        _ => collect_flag(STYLE_FLAGS, &mut self.style_flags, key, &value),
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<PivotTableDefinition, XlsxError> {
        if !self.saw_root {
            return Err(XlsxError::Invalid(
                "pivot table part has no pivotTableDefinition".to_string(),
            ));
        }
        Ok(PivotTableDefinition {
            name: self.name.ok_or(XlsxError::MissingAttr("name"))?,
            cache_id: self.cache_id.ok_or(XlsxError::MissingAttr("cacheId"))?,
            data_caption: self
                .data_caption
                .unwrap_or_else(|| PIVOT_DATA_CAPTION.to_string()),
            location: self.location.ok_or(XlsxError::MissingAttr("ref"))?,
            flags: self.flags,
            style_name: self.style_name,
            style_flags: self.style_flags,
            pivot_fields: self.pivot_fields,
            row_fields: self.row_fields,
            col_fields: self.col_fields,
            page_fields: self.page_fields,
            data_fields: self.data_fields,
        })
    }
}

pub fn parse_pivot_table_definition(xml: &[u8]) -> Result<PivotTableDefinition, XlsxError> {
    let mut reader = Reader::from_reader(Cursor::new(xml));
    reader.config_mut().trim_text(true);

    let mut builder = DefinitionBuilder::default();
    let mut section = Section::Other;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                builder.start_element(&e, section)?;
                match local_name(e.name().as_ref()) {
                    b"pivotFields" => section = Section::PivotFields,
                    b"rowFields" => section = Section::RowFields,
                    b"colFields" => section = Section::ColFields,
                    _ => {}
                }
            }
            Event::Empty(e) => builder.start_element(&e, section)?,
            Event::End(e) => {
                if matches!(
                    local_name(e.name().as_ref()),
                    b"pivotFields" | b"rowFields" | b"colFields"
                ) {
                    section = Section::Other;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn definition() -> PivotTableDefinition {
        let mut row_flags = XmlFlags::new();
        row_flags.insert("compact", false);
        row_flags.insert("outline", true);
        row_flags.insert("defaultSubtotal", true);
        PivotTableDefinition {
            name: "PivotTable1".to_string(),
            cache_id: 1,
            data_caption: PIVOT_DATA_CAPTION.to_string(),
            location: Range::from_a1("G2:M34").unwrap(),
            flags: flags_from(TABLE_FLAGS, &PivotTableOptions {
                row_grand_totals: true,
                show_drill: true,
                ..PivotTableOptions::default()
            }),
            style_name: Some("PivotStyleLight16".to_string()),
            style_flags: flags_from(STYLE_FLAGS, &PivotTableOptions {
                show_row_headers: true,
                ..PivotTableOptions::default()
            }),
            pivot_fields: vec![
                PivotFieldDef {
                    name: Some("Month".to_string()),
                    axis: Some(PivotAxis::Row),
                    data_field: false,
                    flags: row_flags,
                    items: vec![PivotItem::Default],
                },
                PivotFieldDef {
                    axis: Some(PivotAxis::Page),
                    items: vec![PivotItem::Default],
                    ..PivotFieldDef::default()
                },
                PivotFieldDef {
                    data_field: true,
                    ..PivotFieldDef::default()
                },
                PivotFieldDef::default(),
            ],
            row_fields: vec![0],
            col_fields: vec![ColField::Values],
            page_fields: vec![PageField {
                fld: 1,
                name: Some("Region".to_string()),
            }],
            data_fields: vec![
                DataField {
                    name: Some("Total".to_string()),
                    fld: 2,
                    subtotal: SubtotalFunction::Sum,
                },
                DataField {
                    name: None,
                    fld: 2,
                    subtotal: SubtotalFunction::CountNums,
                },
            ],
        }
    }

    #[test]
    fn written_definitions_parse_back() {
        let def = definition();
        let xml = write_pivot_table_definition_xml(&def).unwrap();
        assert_eq!(parse_pivot_table_definition(&xml).unwrap(), def);
    }

    #[test]
    fn writes_excel_placeholders() {
        let xml = write_pivot_table_definition_xml(&definition()).unwrap();
        let xml = std::str::from_utf8(&xml).unwrap();
        let doc = roxmltree::Document::parse(xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.attribute("dataCaption"), Some("Values"));
        assert_eq!(root.attribute("updatedVersion"), Some("8"));
        assert_eq!(root.attribute("createdVersion"), Some("3"));
        assert_eq!(root.attribute("colGrandTotals"), Some("0"));

        let location = doc.descendants().find(|n| n.has_tag_name("location")).unwrap();
        assert_eq!(location.attribute("ref"), Some("G2:M34"));
        assert_eq!(location.attribute("firstHeaderRow"), Some("1"));

        let row_items = doc.descendants().find(|n| n.has_tag_name("rowItems")).unwrap();
        assert_eq!(row_items.attribute("count"), Some("1"));
        let i = row_items.first_element_child().unwrap();
        assert_eq!(i.children().filter(|n| n.has_tag_name("x")).count(), 2);

        let col_field = doc
            .descendants()
            .find(|n| n.has_tag_name("colFields"))
            .and_then(|n| n.first_element_child())
            .unwrap();
        assert_eq!(col_field.attribute("x"), Some("-2"));

        let data_fields: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("dataField"))
            .collect();
        assert_eq!(data_fields[1].attribute("subtotal"), Some("countNums"));
        assert_eq!(data_fields[1].attribute("name"), None);

        let unclassified = doc
            .descendants()
            .filter(|n| n.has_tag_name("pivotField"))
            .nth(3)
            .unwrap();
        assert_eq!(unclassified.attributes().count(), 0);
    }

    #[test]
    fn absent_flags_take_schema_defaults() {
        let xml = br#"<pivotTableDefinition xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" name="P" cacheId="4" showError="1">
  <location ref="A3:C20" firstHeaderRow="1" firstDataRow="2" firstDataCol="1"/>
  <pivotFields count="1"><pivotField axis="axisRow" outline="0"><items count="1"><item x="0"/></items></pivotField></pivotFields>
  <rowFields count="1"><field x="0"/></rowFields>
</pivotTableDefinition>"#;
        let def = parse_pivot_table_definition(xml).unwrap();
        assert_eq!(def.data_caption, "Values");

        let mut options = PivotTableOptions::default();
        apply_flags(TABLE_FLAGS, &def.flags, &mut options);
        apply_flags(STYLE_FLAGS, &def.style_flags, &mut options);
        assert!(options.row_grand_totals);
        assert!(options.col_grand_totals);
        assert!(options.show_drill);
        assert!(options.compact_data);
        assert!(options.show_error);
        assert!(!options.merge_item);
        assert!(!options.show_row_headers);

        let mut field = PivotTableField::new("Month");
        apply_flags(FIELD_FLAGS, &def.pivot_fields[0].flags, &mut field);
        assert!(field.compact);
        assert!(!field.outline);
        assert!(field.default_subtotal);
        assert_eq!(def.pivot_fields[0].items, vec![PivotItem::Index(0)]);
    }

    #[test]
    fn rejects_missing_required_attributes() {
        let xml = br#"<pivotTableDefinition name="P"><location ref="A1:B2"/></pivotTableDefinition>"#;
        assert!(matches!(
            parse_pivot_table_definition(xml),
            Err(XlsxError::MissingAttr("cacheId"))
        ));
        assert!(matches!(
            parse_pivot_table_definition(b"<worksheet/>"),
            Err(XlsxError::Invalid(_))
        ));
    }
}
