//! Decide whether a path names a supported digital-book file.
//!
//! A file qualifies only when its extension is supported *and* the content type
//! declared for that extension is a supported ebook type. With content sniffing
//! enabled the file's magic bytes must also agree with the declared type.

use std::collections::HashMap;
use std::path::Path;

use crate::config::ClassifierConfig;
use crate::detect::{sniff_file, Format};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "epub", "mobi", "chm"];

pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/epub+zip",
    "application/x-mobipocket-ebook",
    "application/vnd.ms-htmlhelp",
];

#[derive(Debug, Clone, Default)]
pub struct FileClassifier {
    /// Per-extension content type overrides (lowercase extension -> MIME).
    content_types: HashMap<String, String>,
    sniff_content: bool,
}

impl FileClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(cfg: &ClassifierConfig) -> Self {
        let mut classifier = Self::new().with_sniffing(cfg.sniff_content);
        for (ext, mime) in &cfg.content_types {
            classifier = classifier.with_content_type(ext, mime);
        }
        classifier
    }

    /// Declare the content type for an extension, replacing the built-in entry.
    pub fn with_content_type(mut self, ext: &str, mime: &str) -> Self {
        self.content_types.insert(
            ext.trim_start_matches('.').to_ascii_lowercase(),
            mime.to_string(),
        );
        self
    }

    pub fn with_sniffing(mut self, enabled: bool) -> Self {
        self.sniff_content = enabled;
        self
    }

    /// The content type associated with an extension.
    pub fn content_type(&self, ext: &str) -> String {
        let ext = ext.to_ascii_lowercase();
        match self.content_types.get(&ext) {
            Some(mime) => mime.clone(),
            None => Format::from_extension(&ext).mime_type().to_string(),
        }
    }

    pub fn is_book_file(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)) {
            return false;
        }

        let declared = self.content_type(ext);
        if !SUPPORTED_MIME_TYPES.contains(&declared.as_str()) {
            tracing::debug!(path = %path.display(), mime = %declared, "Rejected: unsupported content type");
            return false;
        }

        if self.sniff_content {
            return match sniff_file(path) {
                Ok(actual) if actual.mime_type() == declared => true,
                Ok(actual) => {
                    tracing::debug!(path = %path.display(), declared = %declared, actual = %actual, "Rejected: content does not match extension");
                    false
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), "Rejected: could not sniff content: {}", e);
                    false
                }
            };
        }

        true
    }
}

/// Classify with the built-in content type table and no sniffing.
pub fn is_book_file(path: &Path) -> bool {
    FileClassifier::new().is_book_file(path)
}
