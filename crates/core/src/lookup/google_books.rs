//! Google Books volume search.

use reqwest::blocking::Client;

use crate::book::BookInfo;
use crate::config::GOOGLE_BOOKS_URL;
use crate::error::LookupError;
use crate::lookup::{get_json, join_authors, MetadataProvider};

const NAME: &str = "google_books";

pub struct GoogleBooksProvider {
    client: Client,
    base_url: String,
}

impl GoogleBooksProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: GOOGLE_BOOKS_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

impl MetadataProvider for GoogleBooksProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn search(&self, query: &str) -> Result<BookInfo, LookupError> {
        let body = get_json(&self.client, NAME, &self.base_url, query)?;
        Ok(parse_volumes(&body))
    }
}

/// Title and authors of `items[0].volumeInfo`. No items is a miss.
fn parse_volumes(body: &serde_json::Value) -> BookInfo {
    let Some(volume) = body
        .get("items")
        .and_then(|i| i.as_array())
        .and_then(|i| i.first())
        .and_then(|item| item.get("volumeInfo"))
    else {
        return BookInfo::empty();
    };

    let title = volume.get("title").and_then(|t| t.as_str()).map(String::from);
    BookInfo::new(title, join_authors(volume.get("authors")))
}
