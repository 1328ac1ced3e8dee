//! Format identification via file extension and magic bytes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::ReadError;

/// Document formats the pipeline knows about. Only some of them are
/// accepted as books; the rest exist so that their content types can be
/// told apart from the supported ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Pdf,
    Epub,
    Mobi,
    Azw3,
    Chm,
    Fb2,
    Html,
    PlainText,
    Unknown,
}

impl Format {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Pdf => "application/pdf",
            Format::Epub => "application/epub+zip",
            Format::Mobi => "application/x-mobipocket-ebook",
            Format::Azw3 => "application/vnd.amazon.ebook",
            Format::Chm => "application/vnd.ms-htmlhelp",
            Format::Fb2 => "application/x-fictionbook+xml",
            Format::Html => "text/html",
            Format::PlainText => "text/plain",
            Format::Unknown => "application/octet-stream",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Epub => "epub",
            Format::Mobi => "mobi",
            Format::Azw3 => "azw3",
            Format::Chm => "chm",
            Format::Fb2 => "fb2",
            Format::Html => "html",
            Format::PlainText => "txt",
            Format::Unknown => "bin",
        }
    }

    /// Map an extension (without the dot, any case) to a format.
    pub fn from_extension(ext: &str) -> Format {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Format::Pdf,
            "epub" => Format::Epub,
            "mobi" | "prc" => Format::Mobi,
            "azw" | "azw3" | "kf8" => Format::Azw3,
            "chm" => Format::Chm,
            "fb2" => Format::Fb2,
            "html" | "htm" | "xhtml" => Format::Html,
            "txt" | "text" => Format::PlainText,
            _ => Format::Unknown,
        }
    }

    pub fn from_path(path: &Path) -> Format {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Format::from_extension)
            .unwrap_or(Format::Unknown)
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

const HEADER_SIZE: usize = 4096;

/// Identify a file's real format from its leading bytes.
///
/// ZIP containers are opened to tell EPUB apart from other archives, since the
/// `mimetype` entry is not guaranteed to be stored first.
pub fn sniff_file(path: &Path) -> Result<Format, ReadError> {
    let mut file = File::open(path)?;
    let mut header = vec![0u8; HEADER_SIZE];
    let n = file.read(&mut header)?;
    header.truncate(n);

    if let Some(format) = detect_magic_bytes(&header) {
        return Ok(format);
    }
    if header.starts_with(b"PK\x03\x04") {
        return Ok(detect_zip_subformat(File::open(path)?));
    }
    Ok(Format::Unknown)
}

/// Check magic bytes against known signatures.
pub fn detect_magic_bytes(header: &[u8]) -> Option<Format> {
    if header.len() < 4 {
        return None;
    }

    if header.starts_with(b"%PDF-") {
        return Some(Format::Pdf);
    }

    // Microsoft compiled HTML help
    if header.starts_with(b"ITSF") {
        return Some(Format::Chm);
    }

    // Well-formed EPUBs store an uncompressed `mimetype` entry first.
    if header.starts_with(b"PK\x03\x04")
        && header.len() >= 58
        && &header[30..58] == b"mimetypeapplication/epub+zip"
    {
        return Some(Format::Epub);
    }

    // PalmDB header: type/creator at offset 60
    if header.len() >= 68 && &header[60..68] == b"BOOKMOBI" {
        return Some(Format::Mobi);
    }

    None
}

fn detect_zip_subformat<R: Read + std::io::Seek>(input: R) -> Format {
    let Ok(mut archive) = zip::ZipArchive::new(input) else {
        return Format::Unknown;
    };

    if let Ok(mut mimetype) = archive.by_name("mimetype") {
        let mut content = String::new();
        if mimetype.read_to_string(&mut content).is_ok()
            && content.trim() == "application/epub+zip"
        {
            return Format::Epub;
        }
    }

    // Some EPUBs lack the mimetype entry entirely
    if archive.by_name("META-INF/container.xml").is_ok() {
        return Format::Epub;
    }

    Format::Unknown
}
