//! PDF reader: title and author from the document information dictionary.

use std::path::Path;

use lopdf::{Dictionary, Document, Object};

use crate::book::BookInfo;
use crate::error::ReadError;

pub fn read_info(path: &Path) -> Result<BookInfo, ReadError> {
    let doc = Document::load(path).map_err(|e| ReadError::MalformedFile {
        format: "PDF".into(),
        detail: e.to_string(),
    })?;

    let Some(info) = info_dictionary(&doc) else {
        return Ok(BookInfo::empty());
    };

    Ok(BookInfo::new(
        text_field(&doc, info, b"Title"),
        text_field(&doc, info, b"Author"),
    ))
}

/// `/Info` may be stored inline in the trailer or as an indirect object.
fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Dictionary(dict) => Some(dict),
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        _ => None,
    }
}

fn text_field(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let mut value = info.get(key).ok()?;
    if let Object::Reference(id) = value {
        value = doc.get_object(*id).ok()?;
    }
    match value {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a byte-order mark or a
/// single-byte encoding. Non-UTF-8 single-byte data is read as Latin-1.
fn decode_text_string(bytes: &[u8]) -> String {
    let text = if let Some(rest) = bytes.strip_prefix(&[0xFEu8, 0xFF][..]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => bytes.iter().map(|&b| b as char).collect(),
        }
    };
    text.trim_matches('\0').to_string()
}
