use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;
use tabula_model::{CellRef, Range};

use crate::openxml::local_name;
use crate::XlsxError;

/// Display text of every non-blank cell of `worksheet_xml` inside `range`.
///
/// Shared strings are resolved through `shared_strings`; numbers keep their stored `<v>` text;
/// booleans render as `TRUE`/`FALSE`.
pub fn read_cell_text_in_range(
    worksheet_xml: &[u8],
    range: Range,
    shared_strings: &[String],
) -> Result<HashMap<CellRef, String>, XlsxError> {
    let mut reader = Reader::from_reader(worksheet_xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut in_sheet_data = false;

    let mut current_ref: Option<CellRef> = None;
    let mut current_t: Option<String> = None;
    let mut current_value_text: Option<String> = None;
    let mut current_inline_text: Option<String> = None;
    let mut in_v = false;

    let mut cells = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if local_name(e.name().as_ref()) == b"sheetData" => {
                in_sheet_data = true
            }
            Event::End(e) if local_name(e.name().as_ref()) == b"sheetData" => in_sheet_data = false,

            Event::Start(e) if in_sheet_data && local_name(e.name().as_ref()) == b"c" => {
                current_ref = None;
                current_t = None;
                current_value_text = None;
                current_inline_text = None;
                in_v = false;

                for attr in e.attributes().with_checks(false) {
                    let attr = attr?;
                    match local_name(attr.key.as_ref()) {
                        b"r" => {
                            let a1 = attr.unescape_value()?.into_owned();
                            let parsed = CellRef::from_a1(&a1).map_err(|e| {
                                XlsxError::Invalid(format!("invalid cell reference {a1:?}: {e}"))
                            })?;
                            current_ref = Some(parsed);
                        }
                        b"t" => current_t = Some(attr.unescape_value()?.into_owned()),
                        _ => {}
                    }
                }
            }

            Event::End(e) if in_sheet_data && local_name(e.name().as_ref()) == b"c" => {
                if let Some(cell_ref) = current_ref.take() {
                    if range.contains(cell_ref) {
                        let text = interpret_cell_text(
                            current_t.as_deref(),
                            current_value_text.as_deref(),
                            current_inline_text.as_deref(),
                            shared_strings,
                        );
                        if let Some(text) = text.filter(|t| !t.is_empty()) {
                            cells.insert(cell_ref, text);
                        }
                    }
                }
                in_v = false;
            }

            Event::Start(e)
                if in_sheet_data && current_ref.is_some() && local_name(e.name().as_ref()) == b"v" =>
            {
                in_v = true;
            }
            Event::End(e) if in_sheet_data && local_name(e.name().as_ref()) == b"v" => in_v = false,
            Event::Text(e) if in_sheet_data && in_v => {
                current_value_text
                    .get_or_insert_with(String::new)
                    .push_str(&e.unescape()?);
            }

            Event::Start(e)
                if in_sheet_data
                    && current_ref.is_some()
                    && current_t.as_deref() == Some("inlineStr")
                    && local_name(e.name().as_ref()) == b"is" =>
            {
                current_inline_text = Some(read_inline_string(&mut reader)?);
            }

            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(cells)
}

fn interpret_cell_text(
    t: Option<&str>,
    v_text: Option<&str>,
    inline_text: Option<&str>,
    shared_strings: &[String],
) -> Option<String> {
    match t {
        Some("s") => {
            let idx = v_text?.trim().parse::<usize>().ok()?;
            shared_strings.get(idx).cloned()
        }
        Some("b") => {
            let raw = v_text?.trim();
            Some(if raw == "1" || raw.eq_ignore_ascii_case("true") {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            })
        }
        Some("inlineStr") => inline_text.map(str::to_string),
        _ => v_text.map(str::to_string),
    }
}

/// Text of an inline string `<is>`, reader positioned just after its start tag.
fn read_inline_string<R: BufRead>(reader: &mut Reader<R>) -> Result<String, XlsxError> {
    let mut buf = Vec::new();
    let mut out = String::new();
    let mut in_t = false;
    let mut phonetic_depth = 0usize;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match local_name(e.name().as_ref()) {
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_t = true,
                _ => {}
            },
            Event::End(e) => match local_name(e.name().as_ref()) {
                b"is" => break,
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(e) if in_t => out.push_str(&e.unescape()?),
            Event::CData(e) if in_t => out.push_str(std::str::from_utf8(e.as_ref())?),
            Event::Eof => {
                return Err(XlsxError::Invalid(
                    "unexpected EOF while parsing inline string <is>".to_string(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
