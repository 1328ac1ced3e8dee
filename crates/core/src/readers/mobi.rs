//! MOBI / AZW3 reader: title and author from the EXTH header of record 0.
//!
//! Layout: a 78-byte PalmDB header and record list, then record 0 holding a
//! 16-byte PalmDOC header followed by the MOBI header. When bit 0x40 of the
//! EXTH flags is set, the EXTH block follows the MOBI header immediately.

use std::path::Path;

use crate::book::BookInfo;
use crate::error::ReadError;
use crate::security::{self, ReadLimits};

const PDB_HEADER_LEN: usize = 78;
const PALMDOC_HEADER_LEN: usize = 16;
const EXTH_PRESENT: u32 = 0x40;
const EXTH_AUTHOR: u32 = 100;
const EXTH_UPDATED_TITLE: u32 = 503;
const ENCODING_UTF8: u32 = 65001;

pub fn read_exth(path: &Path, limits: &ReadLimits) -> Result<BookInfo, ReadError> {
    let size = std::fs::metadata(path)?.len();
    security::check_resource_size(&path.display().to_string(), size, limits.max_file_size_bytes)?;
    let data = std::fs::read(path)?;
    parse_mobi(&data)
}

pub fn parse_mobi(data: &[u8]) -> Result<BookInfo, ReadError> {
    if data.get(60..68) != Some(&b"BOOKMOBI"[..]) {
        return Err(malformed("missing BOOKMOBI signature"));
    }
    if be_u16(data, 76)? == 0 {
        return Err(malformed("no records"));
    }

    let record0 = be_u32(data, PDB_HEADER_LEN)? as usize;
    let mobi = record0 + PALMDOC_HEADER_LEN;
    if data.get(mobi..mobi + 4) != Some(&b"MOBI"[..]) {
        return Err(malformed("record 0 has no MOBI header"));
    }
    let header_len = be_u32(data, mobi + 4)? as usize;
    let utf8 = be_u32(data, record0 + 28)? == ENCODING_UTF8;

    let full_name = {
        let offset = be_u32(data, record0 + 84)? as usize;
        let len = be_u32(data, record0 + 88)? as usize;
        data.get(record0 + offset..record0 + offset + len)
            .map(|bytes| decode(bytes, utf8))
    };

    let mut title = None;
    let mut authors = Vec::new();

    // EXTH flags live at 0x70 into the MOBI header; older headers are shorter.
    let has_exth = header_len >= 0x74 && be_u32(data, mobi + 0x70)? & EXTH_PRESENT != 0;
    if has_exth {
        for (kind, value) in exth_records(data, mobi + header_len)? {
            match kind {
                EXTH_AUTHOR => authors.push(decode(value, utf8)),
                EXTH_UPDATED_TITLE if title.is_none() => title = Some(decode(value, utf8)),
                _ => {}
            }
        }
    }

    let authors: Vec<String> = authors
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    let author = (!authors.is_empty()).then(|| authors.join(", "));

    Ok(BookInfo::new(title.or(full_name), author))
}

fn exth_records(data: &[u8], start: usize) -> Result<Vec<(u32, &[u8])>, ReadError> {
    if data.get(start..start + 4) != Some(&b"EXTH"[..]) {
        return Err(malformed("EXTH flag set but no EXTH block"));
    }
    let count = be_u32(data, start + 8)?;
    let mut pos = start + 12;
    let mut records = Vec::new();
    for _ in 0..count {
        let kind = be_u32(data, pos)?;
        let len = be_u32(data, pos + 4)? as usize;
        if len < 8 {
            return Err(malformed("EXTH record shorter than its header"));
        }
        let value = data
            .get(pos + 8..pos + len)
            .ok_or_else(|| malformed("EXTH record runs past end of file"))?;
        records.push((kind, value));
        pos += len;
    }
    Ok(records)
}

/// Non-UTF-8 books declare CP1252; Latin-1 covers everything but 0x80..0x9F.
fn decode(bytes: &[u8], utf8: bool) -> String {
    if utf8 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn be_u32(data: &[u8], offset: usize) -> Result<u32, ReadError> {
    data.get(offset..offset + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_be_bytes)
        .ok_or_else(|| malformed("truncated header"))
}

fn be_u16(data: &[u8], offset: usize) -> Result<u16, ReadError> {
    data.get(offset..offset + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_be_bytes)
        .ok_or_else(|| malformed("truncated header"))
}

fn malformed(detail: &str) -> ReadError {
    ReadError::MalformedFile {
        format: "MOBI".into(),
        detail: detail.to_string(),
    }
}
