//! Embedded-metadata readers: pull the declared title and author out of a document header.

pub mod epub;
pub mod mobi;
pub mod pdf;

use std::fs::File;
use std::io::BufReader;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::book::BookInfo;
use crate::detect::Format;
use crate::error::ReadError;
use crate::security::ReadLimits;

/// Read embedded title/author, reporting why the source was unavailable.
///
/// Formats without readable metadata (CHM and anything unrecognized) yield an
/// empty `BookInfo`, which is a miss rather than an error.
pub fn read_embedded(path: &Path) -> Result<BookInfo, ReadError> {
    read_embedded_with(path, &ReadLimits::default())
}

pub fn read_embedded_with(path: &Path, limits: &ReadLimits) -> Result<BookInfo, ReadError> {
    let format = Format::from_path(path);
    // Third-party parsers have been known to panic on corrupt input.
    catch_unwind(AssertUnwindSafe(|| read_format(format, path, limits)))
        .unwrap_or_else(|_| Err(ReadError::Panicked(path.display().to_string())))
}

fn read_format(format: Format, path: &Path, limits: &ReadLimits) -> Result<BookInfo, ReadError> {
    match format {
        Format::Pdf => pdf::read_info(path),
        Format::Epub => {
            let file = File::open(path)?;
            epub::read_metadata(BufReader::new(file), limits)
        }
        Format::Mobi | Format::Azw3 => mobi::read_exth(path, limits),
        _ => Ok(BookInfo::empty()),
    }
}

/// Read embedded title/author. Never fails: any open or parse error is logged
/// and an empty `BookInfo` is returned.
pub fn extract_from_document(path: &Path) -> BookInfo {
    match read_embedded(path) {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(path = %path.display(), "Could not read embedded metadata: {}", e);
            BookInfo::empty()
        }
    }
}
