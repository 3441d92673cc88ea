use std::io::Read;

use zip::read::ZipFile;

use crate::XlsxError;

/// Default maximum uncompressed size permitted for any single ZIP part inflated into memory.
pub(crate) const DEFAULT_MAX_ZIP_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Default maximum total uncompressed bytes permitted when inflating a whole package.
pub(crate) const DEFAULT_MAX_ZIP_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

/// Compare two ZIP entry names the way OPC part names compare.
///
/// Leading `/`, Windows `\` separators, `%XX` escapes and ASCII case are ignored.
pub(crate) fn zip_part_names_equivalent(a: &str, b: &str) -> bool {
    let a = normalize_part_name(a);
    let b = normalize_part_name(b);
    a.eq_ignore_ascii_case(&b)
}

fn normalize_part_name(name: &str) -> String {
    fn hex_val(b: u8) -> Option<u8> {
        match b {
            b'0'..=b'9' => Some(b - b'0'),
            b'a'..=b'f' => Some(b - b'a' + 10),
            b'A'..=b'F' => Some(b - b'A' + 10),
            _ => None,
        }
    }

    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0usize;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b == b'%' && idx + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_val(bytes[idx + 1]), hex_val(bytes[idx + 2])) {
                out.push((hi << 4) | lo);
                idx += 3;
                continue;
            }
        }
        out.push(if b == b'\\' { b'/' } else { b });
        idx += 1;
    }

    let start = out.iter().position(|b| *b != b'/').unwrap_or(out.len());
    String::from_utf8_lossy(&out[start..]).into_owned()
}

/// Inflates the entries of one package while tracking how many bytes have been produced.
///
/// Declared entry sizes are only trusted for an early rejection; every read is capped with
/// `Read::take`, so forged ZIP metadata cannot push a part or the package past its limit.
#[derive(Debug)]
pub(crate) struct PartInflater {
    max_part_bytes: u64,
    max_total_bytes: u64,
    inflated: u64,
}

impl PartInflater {
    pub(crate) fn new(max_part_bytes: u64, max_total_bytes: u64) -> Self {
        Self {
            max_part_bytes,
            max_total_bytes,
            inflated: 0,
        }
    }

    fn part_too_large(&self, part: &str, size: u64) -> XlsxError {
        XlsxError::PartTooLarge {
            part: part.to_string(),
            size,
            max: self.max_part_bytes,
        }
    }

    /// Read `file` fully into memory.
    pub(crate) fn inflate<R: Read>(&mut self, file: &mut ZipFile<'_, R>) -> Result<Vec<u8>, XlsxError> {
        let part = file.name().to_string();
        if file.size() > self.max_part_bytes {
            return Err(self.part_too_large(&part, file.size()));
        }

        let allowance = self
            .max_part_bytes
            .min(self.max_total_bytes.saturating_sub(self.inflated));
        let mut bytes = Vec::new();
        file.take(allowance.saturating_add(1))
            .read_to_end(&mut bytes)?;

        let size = bytes.len() as u64;
        if size > self.max_part_bytes {
            return Err(self.part_too_large(&part, size));
        }
        self.record(size)?;
        Ok(bytes)
    }

    fn record(&mut self, size: u64) -> Result<(), XlsxError> {
        self.inflated = self.inflated.saturating_add(size);
        if self.inflated > self.max_total_bytes {
            return Err(XlsxError::PackageTooLarge {
                total: self.inflated,
                max: self.max_total_bytes,
            });
        }
        Ok(())
    }
}
