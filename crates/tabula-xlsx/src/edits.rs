use std::collections::BTreeMap;

use crate::XlsxPackage;

/// Copy-on-write overlay over an [`XlsxPackage`].
///
/// Writes go to the overlay and reads see the overlay first, so a multi-part operation can be
/// staged completely and applied with [`XlsxPackage::apply_edits`] only once every step has
/// succeeded. Dropping the overlay discards the staged writes.
#[derive(Debug)]
pub(crate) struct PartEdits<'a> {
    base: &'a XlsxPackage,
    staged: BTreeMap<String, Vec<u8>>,
}

impl<'a> PartEdits<'a> {
    pub(crate) fn new(base: &'a XlsxPackage) -> Self {
        Self {
            base,
            staged: BTreeMap::new(),
        }
    }

    pub(crate) fn base(&self) -> &'a XlsxPackage {
        self.base
    }

    /// Key a write should land on: the existing spelling in the base package, if any.
    fn key_for(&self, name: &str) -> String {
        let name = name.strip_prefix('/').unwrap_or(name);
        self.base
            .part_key(name)
            .map(str::to_string)
            .unwrap_or_else(|| name.to_string())
    }

    pub(crate) fn part(&self, name: &str) -> Option<&[u8]> {
        let key = self.key_for(name);
        match self.staged.get(&key) {
            Some(bytes) => Some(bytes.as_slice()),
            None => self.base.part(&key),
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.part(name).is_some()
    }

    pub(crate) fn set_part(&mut self, name: &str, bytes: Vec<u8>) {
        let key = self.key_for(name);
        log::debug!("staging part {key} ({} bytes)", bytes.len());
        self.staged.insert(key, bytes);
    }

    /// Names of all parts visible through the overlay.
    pub(crate) fn part_names(&self) -> impl Iterator<Item = &str> {
        let staged_only = self
            .staged
            .keys()
            .filter(|name| self.base.part_key(name).is_none())
            .map(String::as_str);
        self.base.part_names().chain(staged_only)
    }

    pub(crate) fn into_staged(self) -> BTreeMap<String, Vec<u8>> {
        self.staged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn staged_writes_are_invisible_until_applied() {
        let mut pkg = XlsxPackage::default();
        pkg.set_part("xl/workbook.xml", b"old".to_vec());

        let staged = {
            let mut edits = pkg.begin_edits();
            edits.set_part("/xl/workbook.xml", b"new".to_vec());
            edits.set_part("xl/extra.xml", b"extra".to_vec());
            assert_eq!(edits.part("xl/workbook.xml"), Some(&b"new"[..]));
            assert!(edits.contains("xl/extra.xml"));
            assert_eq!(edits.base().part("xl/workbook.xml"), Some(&b"old"[..]));
            let names: Vec<&str> = edits.part_names().collect();
            assert_eq!(names, vec!["xl/workbook.xml", "xl/extra.xml"]);
            edits.into_staged()
        };
        assert_eq!(pkg.part("xl/workbook.xml"), Some(&b"old"[..]));

        pkg.apply_edits(staged);
        assert_eq!(pkg.part("xl/workbook.xml"), Some(&b"new"[..]));
        assert_eq!(pkg.part("xl/extra.xml"), Some(&b"extra"[..]));
        assert_eq!(pkg.part_names().count(), 2);
    }

    #[test]
    fn dropped_edits_leave_package_untouched() {
        let mut pkg = XlsxPackage::default();
        pkg.set_part("xl/workbook.xml", b"old".to_vec());
        {
            let mut edits = pkg.begin_edits();
            edits.set_part("xl/workbook.xml", b"new".to_vec());
        }
        assert_eq!(pkg.part("xl/workbook.xml"), Some(&b"old"[..]));
    }
}
