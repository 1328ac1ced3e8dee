use serde::{Deserialize, Serialize};

/// A possibly incomplete title/author guess produced by one extraction stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: Option<String>,
    pub author: Option<String>,
}

impl BookInfo {
    /// Build from raw values; blank strings become `None`, others are trimmed.
    pub fn new(title: Option<String>, author: Option<String>) -> Self {
        Self {
            title: clean(title),
            author: clean(author),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn has_author(&self) -> bool {
        self.author.as_deref().is_some_and(|a| !a.trim().is_empty())
    }

    pub fn is_complete(&self) -> bool {
        self.has_title() && self.has_author()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_title() && !self.has_author()
    }

    /// Fill only the fields that are still missing. Values already present win.
    pub fn fill_from(&mut self, other: BookInfo) {
        let (has_title, has_author) = (other.has_title(), other.has_author());
        if !self.has_title() && has_title {
            self.title = other.title;
        }
        if !self.has_author() && has_author {
            self.author = other.author;
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A persisted, uniquely keyed title/author pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: i64,
    pub title: String,
    pub author: String,
}
