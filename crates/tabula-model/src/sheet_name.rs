use unicode_normalization::UnicodeNormalization;

/// Case-fold a sheet name the way Excel compares them: NFKC normalized, then Unicode uppercase.
pub fn sheet_name_casefold(name: &str) -> String {
    if name.is_ascii() {
        return name.to_ascii_uppercase();
    }
    name.nfkc().flat_map(char::to_uppercase).collect()
}

/// Returns true when two sheet names refer to the same sheet.
pub fn sheet_name_eq_case_insensitive(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    sheet_name_casefold(a) == sheet_name_casefold(b)
}

/// Render a sheet name for use in an `Sheet!A1` reference, quoting it when required.
pub fn format_sheet_name(name: &str) -> String {
    if !needs_quoting(name) {
        return name.to_string();
    }
    format!("'{}'", name.replace('\'', "''"))
}

/// Remove the surrounding quotes of a `'Sheet Name'` token and collapse `''` escapes.
///
/// Unquoted input is returned unchanged.
pub fn unquote_sheet_name(token: &str) -> String {
    match token
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        Some(inner) => inner.replace("''", "'"),
        None => token.to_string(),
    }
}

fn needs_quoting(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if first.is_ascii_digit() {
        return true;
    }
    !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_roundtrips() {
        assert_eq!(format_sheet_name("Sheet1"), "Sheet1");
        assert_eq!(format_sheet_name("Q1 Sales"), "'Q1 Sales'");
        assert_eq!(format_sheet_name("2024"), "'2024'");
        assert_eq!(format_sheet_name("It's"), "'It''s'");
        assert_eq!(unquote_sheet_name("'It''s'"), "It's");
        assert_eq!(unquote_sheet_name("Data"), "Data");
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert!(sheet_name_eq_case_insensitive("Sheet1", "SHEET1"));
        assert!(sheet_name_eq_case_insensitive("Übersicht", "übersicht"));
        assert!(!sheet_name_eq_case_insensitive("Sheet1", "Sheet2"));
    }
}
