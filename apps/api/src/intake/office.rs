//! Text extraction for zipped XML office documents (`.docx`, `.odt`).

use std::io::{Cursor, Read};

use zip::ZipArchive;

use super::ReadError;

const DOCX_BODY: &str = "word/document.xml";
const ODT_BODY: &str = "content.xml";

const DOCX_BREAKS: &[(&str, &str)] = &[
    ("</w:p>", "\n"),
    ("<w:tab/>", "\t"),
    ("<w:br/>", "\n"),
    ("<w:cr/>", "\n"),
];

const ODT_BREAKS: &[(&str, &str)] = &[
    ("</text:p>", "\n"),
    ("</text:h>", "\n"),
    ("<text:tab/>", "\t"),
    ("<text:line-break/>", "\n"),
];

pub(super) fn extract_docx(bytes: &[u8]) -> Result<String, ReadError> {
    let xml = read_entry(bytes, DOCX_BODY)?;
    Ok(xml_to_text(&xml, DOCX_BREAKS))
}

pub(super) fn extract_odt(bytes: &[u8]) -> Result<String, ReadError> {
    let xml = read_entry(bytes, ODT_BODY)?;
    Ok(xml_to_text(&xml, ODT_BREAKS))
}

fn read_entry(bytes: &[u8], name: &str) -> Result<String, ReadError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ReadError::Archive(format!("Failed to open zip archive: {e}")))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| ReadError::Archive(format!("Failed to open entry {name}: {e}")))?;

    let mut xml = String::new();
    entry.read_to_string(&mut xml)?;
    Ok(xml)
}

/// Converts document XML to text: structural tags become line breaks or
/// tabs, all other markup is dropped and entities are decoded.
fn xml_to_text(xml: &str, breaks: &[(&str, &str)]) -> String {
    let with_breaks = breaks
        .iter()
        .fold(xml.to_string(), |acc, (tag, replacement)| {
            acc.replace(tag, replacement)
        });

    // A bare '>' is legal in both character data and attribute values, so
    // only an unquoted '>' inside a tag closes it.
    let mut result = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    let mut quote: Option<char> = None;
    for ch in with_breaks.chars() {
        match (in_tag, quote, ch) {
            (false, _, '<') => in_tag = true,
            (false, _, _) => result.push(ch),
            (true, None, '"' | '\'') => quote = Some(ch),
            (true, Some(q), _) if ch == q => quote = None,
            (true, None, '>') => in_tag = false,
            (true, _, _) => {}
        }
    }

    decode_xml_entities(&result)
        .lines()
        .map(|line| line.trim_end())
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_xml_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or(name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}
