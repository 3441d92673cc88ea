use quick_xml::{de::from_str, se::to_string};
use serde::{Deserialize, Serialize};
use tabula_model::{Range, SheetRect};

use crate::openxml::{RELATIONSHIPS_NS, SPREADSHEETML_NS};
use crate::XlsxError;

use super::{PIVOT_CREATED_VERSION, PIVOT_MIN_REFRESHABLE_VERSION, PIVOT_REFRESHED_VERSION};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Where a pivot cache reads its rows from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSource {
    /// `worksheetSource ref=".." sheet=".."`.
    Worksheet(SheetRect),
    /// `worksheetSource name=".."`: a table or defined name.
    Named(String),
}

/// The subset of `pivotCacheDefinition` that pivot read-back needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDefinition {
    pub source: CacheSource,
    pub field_names: Vec<String>,
    pub refresh_on_load: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename = "pivotCacheDefinition")]
struct CacheDefinitionXmlOut<'a> {
    #[serde(rename = "@xmlns")]
    xmlns: &'static str,
    #[serde(rename = "@xmlns:r")]
    xmlns_r: &'static str,
    #[serde(rename = "@saveData")]
    save_data: u8,
    #[serde(rename = "@refreshOnLoad")]
    refresh_on_load: u8,
    #[serde(rename = "@createdVersion")]
    created_version: u32,
    #[serde(rename = "@refreshedVersion")]
    refreshed_version: u32,
    #[serde(rename = "@minRefreshableVersion")]
    min_refreshable_version: u32,
    #[serde(rename = "cacheSource")]
    cache_source: CacheSourceXmlOut<'a>,
    #[serde(rename = "cacheFields")]
    cache_fields: CacheFieldsXmlOut<'a>,
}

#[derive(Debug, Serialize)]
struct CacheSourceXmlOut<'a> {
    #[serde(rename = "@type")]
    source_type: &'static str,
    #[serde(rename = "worksheetSource")]
    worksheet_source: WorksheetSourceXmlOut<'a>,
}

#[derive(Debug, Serialize)]
struct WorksheetSourceXmlOut<'a> {
    #[serde(rename = "@ref", skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(rename = "@sheet", skip_serializing_if = "Option::is_none")]
    sheet: Option<&'a str>,
    #[serde(rename = "@name", skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CacheFieldsXmlOut<'a> {
    #[serde(rename = "@count")]
    count: usize,
    #[serde(rename = "cacheField")]
    fields: Vec<CacheFieldXmlOut<'a>>,
}

#[derive(Debug, Serialize)]
struct CacheFieldXmlOut<'a> {
    #[serde(rename = "@name")]
    name: &'a str,
    #[serde(rename = "@numFmtId")]
    num_fmt_id: u32,
    #[serde(rename = "sharedItems")]
    shared_items: SharedItemsXmlOut,
}

/// No values are cached: every field only carries the blank placeholder.
#[derive(Debug, Serialize)]
struct SharedItemsXmlOut {
    #[serde(rename = "@containsBlank")]
    contains_blank: u8,
    m: MissingItemXmlOut,
}

#[derive(Debug, Serialize)]
struct MissingItemXmlOut {}

/// Serialize a cache definition with one cache field per header, in header order.
pub fn write_cache_definition_xml(
    source: &CacheSource,
    field_names: &[String],
) -> Result<String, XlsxError> {
    let worksheet_source = match source {
        CacheSource::Worksheet(rect) => WorksheetSourceXmlOut {
            reference: Some(rect.range.to_string()),
            sheet: Some(rect.sheet.as_str()),
            name: None,
        },
        CacheSource::Named(name) => WorksheetSourceXmlOut {
            reference: None,
            sheet: None,
            name: Some(name.as_str()),
        },
    };

    let xml = CacheDefinitionXmlOut {
        xmlns: SPREADSHEETML_NS,
        xmlns_r: RELATIONSHIPS_NS,
        save_data: 0,
        refresh_on_load: 1,
        created_version: PIVOT_CREATED_VERSION,
        refreshed_version: PIVOT_REFRESHED_VERSION,
        min_refreshable_version: PIVOT_MIN_REFRESHABLE_VERSION,
        cache_source: CacheSourceXmlOut {
            source_type: "worksheet",
            worksheet_source,
        },
        cache_fields: CacheFieldsXmlOut {
            count: field_names.len(),
            fields: field_names
                .iter()
                .map(|name| CacheFieldXmlOut {
                    name,
                    num_fmt_id: 0,
                    shared_items: SharedItemsXmlOut {
                        contains_blank: 1,
                        m: MissingItemXmlOut {},
                    },
                })
                .collect(),
        },
    };
    Ok(format!("{XML_DECLARATION}\n{}", to_string(&xml)?))
}

#[derive(Debug, Deserialize)]
struct CacheDefinitionXml {
    #[serde(rename = "@refreshOnLoad", default)]
    refresh_on_load: Option<String>,
    #[serde(rename = "cacheSource")]
    cache_source: CacheSourceXml,
    #[serde(rename = "cacheFields", default)]
    cache_fields: Option<CacheFieldsXml>,
}

#[derive(Debug, Deserialize)]
struct CacheSourceXml {
    #[serde(rename = "@type", default)]
    source_type: Option<String>,
    #[serde(rename = "worksheetSource", default)]
    worksheet_source: Option<WorksheetSourceXml>,
}

#[derive(Debug, Deserialize)]
struct WorksheetSourceXml {
    #[serde(rename = "@ref", default)]
    reference: Option<String>,
    #[serde(rename = "@sheet", default)]
    sheet: Option<String>,
    #[serde(rename = "@name", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CacheFieldsXml {
    #[serde(rename = "cacheField", default)]
    fields: Vec<CacheFieldXml>,
}

#[derive(Debug, Deserialize)]
struct CacheFieldXml {
    #[serde(rename = "@name")]
    name: String,
}

pub fn parse_cache_definition(xml: &str) -> Result<CacheDefinition, XlsxError> {
    let parsed: CacheDefinitionXml = from_str(xml)?;

    let source_type = parsed.cache_source.source_type.as_deref().unwrap_or("worksheet");
    if source_type != "worksheet" {
        return Err(XlsxError::Invalid(format!(
            "unsupported pivot cache source type {source_type:?}"
        )));
    }
    let worksheet_source = parsed
        .cache_source
        .worksheet_source
        .ok_or(XlsxError::MissingAttr("worksheetSource"))?;

    let source = match worksheet_source.name.filter(|n| !n.is_empty()) {
        Some(name) => CacheSource::Named(name),
        None => {
            let reference = worksheet_source
                .reference
                .ok_or(XlsxError::MissingAttr("ref"))?;
            let sheet = worksheet_source.sheet.ok_or(XlsxError::MissingAttr("sheet"))?;
            let range = Range::from_a1(&reference).map_err(|e| {
                XlsxError::Invalid(format!("invalid worksheetSource ref {reference:?}: {e}"))
            })?;
            CacheSource::Worksheet(SheetRect { sheet, range })
        }
    };

    Ok(CacheDefinition {
        source,
        field_names: parsed
            .cache_fields
            .map(|f| f.fields.into_iter().map(|f| f.name).collect())
            .unwrap_or_default(),
        refresh_on_load: parsed
            .refresh_on_load
            .as_deref()
            .and_then(crate::openxml::parse_xml_bool)
            .unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use tabula_model::normalize_rectangle;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn writes_one_blank_cache_field_per_header() {
        let source = CacheSource::Worksheet(normalize_rectangle("Sheet1!A1:E31").unwrap());
        let xml =
            write_cache_definition_xml(&source, &names(&["Month", "Year", "Type"])).unwrap();

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let root = doc.root_element();
        assert_eq!(root.tag_name().name(), "pivotCacheDefinition");
        assert_eq!(root.attribute("saveData"), Some("0"));
        assert_eq!(root.attribute("refreshOnLoad"), Some("1"));
        assert_eq!(root.attribute("createdVersion"), Some("3"));
        assert_eq!(root.attribute("refreshedVersion"), Some("8"));
        assert_eq!(root.attribute("minRefreshableVersion"), Some("3"));

        let ws = doc
            .descendants()
            .find(|n| n.has_tag_name("worksheetSource"))
            .unwrap();
        assert_eq!(ws.attribute("ref"), Some("A1:E31"));
        assert_eq!(ws.attribute("sheet"), Some("Sheet1"));
        assert_eq!(ws.attribute("name"), None);

        let fields: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("cacheField"))
            .collect();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[2].attribute("name"), Some("Type"));
        assert_eq!(fields[0].attribute("numFmtId"), Some("0"));
        let shared = fields[0].first_element_child().unwrap();
        assert_eq!(shared.attribute("containsBlank"), Some("1"));
        assert_eq!(
            shared.children().filter(|n| n.has_tag_name("m")).count(),
            1
        );
    }

    #[test]
    fn named_sources_round_trip() {
        let source = CacheSource::Named("SalesTable".to_string());
        let xml = write_cache_definition_xml(&source, &names(&["A", "B"])).unwrap();
        assert!(!xml.contains("sheet="));
        let parsed = parse_cache_definition(&xml).unwrap();
        assert_eq!(
            parsed,
            CacheDefinition {
                source,
                field_names: names(&["A", "B"]),
                refresh_on_load: true,
            }
        );
    }

    #[test]
    fn parses_excel_written_cache() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<pivotCacheDefinition xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" r:id="rId1" refreshedVersion="6" recordCount="2">
  <cacheSource type="worksheet"><worksheetSource ref="A1:B3" sheet="My Data"/></cacheSource>
  <cacheFields count="2">
    <cacheField name="Region" numFmtId="0"><sharedItems count="2"><s v="East"/><s v="West"/></sharedItems></cacheField>
    <cacheField name="Sales" numFmtId="0"><sharedItems containsSemiMixedTypes="0" containsString="0" containsNumber="1" minValue="1" maxValue="9"/></cacheField>
  </cacheFields>
</pivotCacheDefinition>"#;
        let parsed = parse_cache_definition(xml).unwrap();
        assert_eq!(
            parsed.source,
            CacheSource::Worksheet(normalize_rectangle("'My Data'!A1:B3").unwrap())
        );
        assert_eq!(parsed.field_names, names(&["Region", "Sales"]));
        assert!(!parsed.refresh_on_load);
    }

    #[test]
    fn rejects_non_worksheet_sources() {
        let xml = r#"<pivotCacheDefinition xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><cacheSource type="external" connectionId="1"/></pivotCacheDefinition>"#;
        assert!(matches!(
            parse_cache_definition(xml),
            Err(XlsxError::Invalid(_))
        ));
    }
}
