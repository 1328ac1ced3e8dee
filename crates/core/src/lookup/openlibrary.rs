//! Open Library search provider.

use reqwest::blocking::Client;

use crate::book::BookInfo;
use crate::config::OPENLIBRARY_URL;
use crate::error::LookupError;
use crate::lookup::{get_json, join_authors, MetadataProvider};

const NAME: &str = "openlibrary";

pub struct OpenLibraryProvider {
    client: Client,
    base_url: String,
}

impl OpenLibraryProvider {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: OPENLIBRARY_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }
}

impl MetadataProvider for OpenLibraryProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn search(&self, query: &str) -> Result<BookInfo, LookupError> {
        let body = get_json(&self.client, NAME, &self.base_url, query)?;
        Ok(parse_search_response(&body))
    }
}

fn parse_search_response(body: &serde_json::Value) -> BookInfo {
    let Some(doc) = body.get("docs").and_then(|d| d.as_array()).and_then(|d| d.first()) else {
        return BookInfo::empty();
    };
    let title = doc.get("title").and_then(|t| t.as_str()).map(String::from);
    BookInfo::new(title, join_authors(doc.get("author_name")))
}
