use super::*;

use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn subtotal_names_parse_case_insensitively() {
    assert_eq!(SubtotalFunction::from_name("SUM"), Some(SubtotalFunction::Sum));
    assert_eq!(
        SubtotalFunction::from_name("countnums"),
        Some(SubtotalFunction::CountNums)
    );
    assert_eq!(
        SubtotalFunction::from_name("StdDevP"),
        Some(SubtotalFunction::StdDevp)
    );
    assert_eq!(SubtotalFunction::from_name("median"), None);
    assert_eq!(SubtotalFunction::from_name_or_sum("median"), SubtotalFunction::Sum);
    assert_eq!(SubtotalFunction::from_name_or_sum(""), SubtotalFunction::Sum);
}

#[test]
fn subtotal_spellings() {
    for f in SubtotalFunction::ALL {
        assert_eq!(SubtotalFunction::from_name(f.xml_name()), Some(f));
        assert_eq!(SubtotalFunction::from_name(f.title()), Some(f));
    }
    assert_eq!(SubtotalFunction::CountNums.xml_name(), "countNums");
    assert_eq!(SubtotalFunction::Sum.to_string(), "Sum");
}

#[test]
fn field_names_truncate_on_character_boundaries() {
    let long = "é".repeat(300);
    let field = PivotTableField::new("Sales").with_name(long);
    let shown = field.display_name().unwrap();
    assert_eq!(shown.chars().count(), MAX_FIELD_LENGTH);
    assert_eq!(truncate_field_name("Summarize"), "Summarize");
}

#[test]
fn builtin_styles_cover_three_families() {
    let names: Vec<String> = builtin_pivot_style_names().collect();
    assert_eq!(names.len(), 84);
    assert_eq!(names.first().map(String::as_str), Some("PivotStyleLight1"));
    assert_eq!(names.last().map(String::as_str), Some("PivotStyleDark28"));
    assert!(names.iter().all(|n| is_builtin_pivot_style(n)));
    assert!(is_builtin_pivot_style(DEFAULT_PIVOT_STYLE_NAME));
    assert!(!is_builtin_pivot_style("PivotStyleLight29"));
    assert!(!is_builtin_pivot_style("PivotStyleMedium07"));
    assert!(!is_builtin_pivot_style("TableStyleLight1"));
}

#[test]
fn style_defaults_when_unset_or_empty() {
    let mut opts = PivotTableOptions::default();
    assert_eq!(opts.style_name_or_default(), "PivotStyleLight16");
    opts.style_name = Some(String::new());
    assert_eq!(opts.style_name_or_default(), "PivotStyleLight16");
    opts.style_name = Some("PivotStyleDark3".to_string());
    assert_eq!(opts.style_name_or_default(), "PivotStyleDark3");
}

#[test]
fn options_serde_uses_camel_case_and_defaults() {
    let opts = PivotTableOptions {
        data_range: "Sheet1!A1:E31".to_string(),
        pivot_table_range: "Sheet1!G2:M34".to_string(),
        rows: vec![PivotTableField::new("Month").with_default_subtotal(true)],
        data: vec![PivotTableField::new("Sales")
            .with_name("Summarize")
            .with_subtotal(SubtotalFunction::CountNums)],
        row_grand_totals: true,
        ..PivotTableOptions::default()
    };

    let value = serde_json::to_value(&opts).unwrap();
    assert_eq!(value["dataRange"], json!("Sheet1!A1:E31"));
    assert_eq!(value["rows"][0]["defaultSubtotal"], json!(true));
    assert_eq!(value["data"][0]["subtotal"], json!("countNums"));
    assert!(value.get("styleName").is_none());

    let decoded: PivotTableOptions = serde_json::from_value(value).unwrap();
    assert_eq!(decoded, opts);

    let sparse: PivotTableOptions =
        serde_json::from_value(json!({ "dataRange": "Table1" })).unwrap();
    assert_eq!(sparse.data_range, "Table1");
    assert!(sparse.rows.is_empty());
    assert!(!sparse.show_drill);
}

#[test]
fn subtotal_deserialization_is_lenient() {
    let field: PivotTableField =
        serde_json::from_str(r#"{"data":"Sales","subtotal":"Sum"}"#).unwrap();
    assert_eq!(field.subtotal, Some(SubtotalFunction::Sum));

    let field: PivotTableField =
        serde_json::from_str(r#"{"data":"Sales","subtotal":"STDDEVP"}"#).unwrap();
    assert_eq!(field.subtotal, Some(SubtotalFunction::StdDevp));

    let field: PivotTableField =
        serde_json::from_str(r#"{"data":"Sales","subtotal":"median"}"#).unwrap();
    assert_eq!(field.subtotal, Some(SubtotalFunction::Sum));

    assert_eq!(
        serde_json::to_value(SubtotalFunction::CountNums).unwrap(),
        json!("countNums")
    );
}
