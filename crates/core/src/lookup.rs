//! Remote bibliographic lookup via pluggable providers (Google Books, Open Library).
//!
//! Providers are tried in priority order and the first result carrying a title
//! wins. An unreachable or misbehaving provider is treated like one that found
//! nothing, so the chain always moves on to the next provider.

pub mod google_books;
pub mod openlibrary;

use std::time::Duration;

use reqwest::blocking::Client;

use crate::book::BookInfo;
use crate::config::LookupConfig;
use crate::error::{ConfigError, LookupError};

use self::google_books::GoogleBooksProvider;
use self::openlibrary::OpenLibraryProvider;

pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Search by free-text query. `Ok` with an empty `BookInfo` means "no match".
    fn search(&self, query: &str) -> Result<BookInfo, LookupError>;
}

/// Build the HTTP client shared by every provider for one run.
pub fn build_client(cfg: &LookupConfig) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs.max(1)))
        .user_agent(cfg.user_agent.clone())
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Provider names accepted in `lookup.providers`.
pub fn provider_from_name(
    name: &str,
    client: &Client,
    cfg: &LookupConfig,
) -> Result<Box<dyn MetadataProvider>, ConfigError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "google_books" | "googlebooks" | "google" => {
            let mut p = GoogleBooksProvider::new(client.clone());
            if let Some(url) = &cfg.google_books_url {
                p = p.with_base_url(url);
            }
            Ok(Box::new(p))
        }
        "openlibrary" | "open_library" => {
            let mut p = OpenLibraryProvider::new(client.clone());
            if let Some(url) = &cfg.openlibrary_url {
                p = p.with_base_url(url);
            }
            Ok(Box::new(p))
        }
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}

/// Ordered list of providers queried until one of them produces a title.
#[derive(Default)]
pub struct LookupChain {
    providers: Vec<Box<dyn MetadataProvider>>,
}

impl LookupChain {
    pub fn new(providers: Vec<Box<dyn MetadataProvider>>) -> Self {
        Self { providers }
    }

    /// Build from config. A disabled lookup yields an empty chain.
    pub fn from_config(cfg: &LookupConfig) -> Result<Self, ConfigError> {
        if !cfg.enabled {
            return Ok(Self::default());
        }
        let client = build_client(cfg)?;
        let providers = cfg
            .providers
            .iter()
            .map(|name| provider_from_name(name, &client, cfg))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(providers))
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Query providers in order. Returns `Err` only when every provider failed;
    /// if at least one answered without a match the result is an empty `Ok`.
    pub fn try_resolve(&self, query: &str) -> Result<BookInfo, LookupError> {
        let query = query.trim();
        if query.is_empty() || self.providers.is_empty() {
            return Ok(BookInfo::empty());
        }

        let mut last_error = None;
        let mut failures = 0;
        for provider in &self.providers {
            match provider.search(query) {
                Ok(info) if info.has_title() => {
                    tracing::debug!(provider = provider.name(), query, "Lookup hit");
                    return Ok(info);
                }
                Ok(_) => {
                    tracing::debug!(provider = provider.name(), query, "Lookup found nothing");
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), query, "Lookup failed: {}", e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if failures == self.providers.len() => Err(LookupError::Unavailable {
                count: failures,
                last: e.to_string(),
            }),
            _ => Ok(BookInfo::empty()),
        }
    }

    /// Query providers in order. Never fails; an unusable chain yields an empty result.
    pub fn resolve_online(&self, query: &str) -> BookInfo {
        self.try_resolve(query).unwrap_or_default()
    }
}

/// GET `url?q=query` and parse the body as JSON.
pub(crate) fn get_json(
    client: &Client,
    provider: &str,
    url: &str,
    query: &str,
) -> Result<serde_json::Value, LookupError> {
    let network = |e: reqwest::Error| LookupError::Network {
        provider: provider.to_string(),
        message: e.to_string(),
    };

    let response = client.get(url).query(&[("q", query)]).send().map_err(network)?;
    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::Status {
            provider: provider.to_string(),
            status: status.as_u16(),
        });
    }
    let body = response.text().map_err(network)?;
    serde_json::from_str(&body).map_err(|e| LookupError::Malformed {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

/// Collect string entries of a JSON array and join them with ", ".
pub(crate) fn join_authors(value: Option<&serde_json::Value>) -> Option<String> {
    let authors: Vec<&str> = value
        .and_then(|a| a.as_array())
        .map(|a| a.iter().filter_map(|v| v.as_str()).map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    (!authors.is_empty()).then(|| authors.join(", "))
}
