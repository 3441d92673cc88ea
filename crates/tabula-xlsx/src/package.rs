use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use tabula_model::sheet_name_eq_case_insensitive;
use thiserror::Error;

use crate::edits::PartEdits;
use crate::openxml::rels_part_name;
use crate::relationships::Relationships;
use crate::sheet_metadata::{parse_workbook_sheets, SheetVisibility, WorkbookSheetInfo};
use crate::zip_util::{
    zip_part_names_equivalent, PartInflater, DEFAULT_MAX_ZIP_PART_BYTES,
    DEFAULT_MAX_ZIP_TOTAL_BYTES,
};

pub(crate) const WORKBOOK_PART: &str = "xl/workbook.xml";
pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Size limits enforced by [`XlsxPackage::from_bytes_limited`].
#[derive(Debug, Clone, Copy)]
pub struct XlsxPackageLimits {
    /// Maximum allowed uncompressed bytes for any single part.
    pub max_part_bytes: u64,
    /// Maximum allowed uncompressed bytes across the whole package.
    pub max_total_bytes: u64,
}

impl Default for XlsxPackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_ZIP_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_ZIP_TOTAL_BYTES,
        }
    }
}

#[derive(Debug, Error)]
pub enum XlsxError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml error: {0}")]
    RoXml(#[from] roxmltree::Error),
    #[error("xml deserialization error: {0}")]
    XmlDe(#[from] quick_xml::de::DeError),
    #[error("xml serialization error: {0}")]
    XmlSe(#[from] quick_xml::se::SeError),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("utf-8 error: {0}")]
    Utf8Str(#[from] std::str::Utf8Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("missing required attribute: {0}")]
    MissingAttr(&'static str),
    #[error("missing xlsx part: {0}")]
    MissingPart(String),
    #[error("invalid xlsx: {0}")]
    Invalid(String),
    #[error(
        "xlsx package part is too large to load safely: {part} is {size} bytes (max {max} bytes)"
    )]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("xlsx package is too large to load safely: {total} bytes uncompressed (max {max})")]
    PackageTooLarge { total: u64, max: u64 },
    #[error("invalid sheetId value")]
    InvalidSheetId,
}

/// Resolved metadata for a workbook sheet and its corresponding worksheet part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetPartInfo {
    pub name: String,
    pub sheet_id: u32,
    pub rel_id: String,
    pub visibility: SheetVisibility,
    /// ZIP entry name for the worksheet XML (e.g. `xl/worksheets/sheet1.xml`).
    pub worksheet_part: String,
}

/// An OPC package held in memory as a map of part name to raw bytes.
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
}

impl XlsxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: XlsxPackageLimits) -> Result<Self, XlsxError> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut inflater = PartInflater::new(limits.max_part_bytes, limits.max_total_bytes);

        let mut parts = BTreeMap::new();
        for idx in 0..archive.len() {
            let mut entry = archive.by_index(idx)?;
            if entry.is_dir() {
                continue;
            }
            let bytes = inflater.inflate(&mut entry)?;
            parts.insert(entry.name().to_string(), bytes);
        }
        log::debug!("loaded package with {} parts", parts.len());

        Ok(Self { parts })
    }

    pub(crate) fn from_parts_map(parts: BTreeMap<String, Vec<u8>>) -> Self {
        Self { parts }
    }

    /// Stored key for `name`, tolerating a leading `/`, `\` separators and ASCII case.
    pub(crate) fn part_key(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.parts.get_key_value(name) {
            return Some(key.as_str());
        }
        if let Some(stripped) = name.strip_prefix('/') {
            if let Some((key, _)) = self.parts.get_key_value(stripped) {
                return Some(key.as_str());
            }
        }
        self.parts
            .keys()
            .find(|key| zip_part_names_equivalent(key.as_str(), name))
            .map(String::as_str)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let key = self.part_key(name)?;
        self.parts.get(key).map(Vec::as_slice)
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.parts
            .iter()
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    /// Start a set of staged edits against this package. Nothing changes until
    /// [`XlsxPackage::apply_edits`] is called with the result.
    pub(crate) fn begin_edits(&self) -> PartEdits<'_> {
        PartEdits::new(self)
    }

    pub(crate) fn apply_edits(&mut self, staged: BTreeMap<String, Vec<u8>>) {
        for (name, bytes) in staged {
            log::debug!("committing part {name} ({} bytes)", bytes.len());
            self.parts.insert(name, bytes);
        }
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Serialize the package as a ZIP archive with every part deflated.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), XlsxError> {
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in &self.parts {
            archive.start_file(name.as_str(), options)?;
            archive.write_all(bytes)?;
        }
        w.write_all(archive.finish()?.get_ref())?;
        Ok(())
    }

    /// Parse the ordered list of workbook sheets from `xl/workbook.xml`.
    pub fn workbook_sheets(&self) -> Result<Vec<WorkbookSheetInfo>, XlsxError> {
        let workbook_xml = self
            .part(WORKBOOK_PART)
            .ok_or_else(|| XlsxError::MissingPart(WORKBOOK_PART.to_string()))?;
        parse_workbook_sheets(std::str::from_utf8(workbook_xml)?)
    }

    /// Workbook sheets in tab order, each with the worksheet part its `r:id` points at.
    pub fn worksheet_parts(&self) -> Result<Vec<WorksheetPartInfo>, XlsxError> {
        let rels_name = rels_part_name(WORKBOOK_PART);
        let rels = Relationships::parse(Some(
            self.part(&rels_name)
                .ok_or_else(|| XlsxError::MissingPart(rels_name.clone()))?,
        ))?;

        self.workbook_sheets()?
            .into_iter()
            .map(|sheet| {
                let worksheet_part = rels
                    .get(&sheet.rel_id)
                    .and_then(|rel| rel.resolve(WORKBOOK_PART))
                    .ok_or_else(|| {
                        XlsxError::Invalid(format!(
                            "sheet {:?} has no worksheet relationship {}",
                            sheet.name, sheet.rel_id
                        ))
                    })?;
                Ok(WorksheetPartInfo {
                    name: sheet.name,
                    sheet_id: sheet.sheet_id,
                    rel_id: sheet.rel_id,
                    visibility: sheet.visibility,
                    worksheet_part,
                })
            })
            .collect()
    }

    /// Worksheet part for the sheet called `sheet_name` (compared case-insensitively).
    pub fn worksheet_part(&self, sheet_name: &str) -> Result<Option<String>, XlsxError> {
        Ok(self
            .worksheet_parts()?
            .into_iter()
            .find(|info| sheet_name_eq_case_insensitive(&info.name, sheet_name))
            .map(|info| info.worksheet_part))
    }
}
