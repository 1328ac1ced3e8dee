//! Filename heuristics: guess title and author from a bare filename.

use std::sync::LazyLock;

use regex::Regex;

use crate::book::BookInfo;

macro_rules! pattern {
    ($name:ident, $regex:literal) => {
        static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

pattern!(EXTENSION, r"\.[A-Za-z0-9]+$");
pattern!(DOUBLE_DASH, r"^(.+?) -- (.+?)$");
pattern!(DASH_WITH_EXTRA, r"^(.+?) - (.+?) - .+$");
pattern!(DASH, r"^(.+?) - (.+?)$");
pattern!(PARENTHESIZED, r"^(.+) \(([^()]+)\)$");
pattern!(BY, r"^(.+) by (.+?)$");

/// Separator patterns, most specific first. The first match wins.
static PATTERNS: [&LazyLock<Regex>; 5] = [
    &DOUBLE_DASH,     // "Title -- Author"
    &DASH_WITH_EXTRA, // "Title - Author - Year"
    &DASH,            // "Title - Author"
    &PARENTHESIZED,   // "Title (Author)"
    &BY,              // "Title by Author"
];

/// Strip a trailing `.ext` from a filename. Directory components are dropped.
pub fn strip_extension(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    EXTENSION.replace(base, "").into_owned()
}

/// Guess title and author from a filename. Never fails: with no matching
/// pattern the whole stem becomes the title and the author is left empty.
pub fn parse_filename(name: &str) -> BookInfo {
    let stem = strip_extension(name);

    for pattern in PATTERNS {
        if let Some(caps) = pattern.captures(&stem) {
            let title = caps.get(1).map(|m| m.as_str().to_string());
            let author = caps.get(2).map(|m| m.as_str().to_string());
            let info = BookInfo::new(title, author);
            if info.is_complete() {
                return info;
            }
        }
    }

    BookInfo::new(Some(stem), None)
}
