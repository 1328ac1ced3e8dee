//! Config file parsing for `~/.config/smartlib/config.toml`.
//!
//! A missing file means defaults; a file that exists but cannot be parsed is a
//! configuration error and stops the run before any book is processed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const APP_DIR: &str = "smartlib";
pub const DEFAULT_UNKNOWN_AUTHOR: &str = "Unknown Author";
pub const GOOGLE_BOOKS_URL: &str = "https://www.googleapis.com/books/v1/volumes";
pub const OPENLIBRARY_URL: &str = "https://openlibrary.org/search.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub lookup: LookupConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; defaults to the platform data directory.
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Providers in priority order.
    #[serde(default = "default_providers")]
    pub providers: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    pub google_books_url: Option<String>,
    pub openlibrary_url: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_providers() -> Vec<String> {
    vec!["google_books".to_string(), "openlibrary".to_string()]
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_user_agent() -> String {
    format!("smartlib/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            providers: default_providers(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            google_books_url: None,
            openlibrary_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub sniff_content: bool,
    /// Extension -> content type overrides.
    #[serde(default)]
    pub content_types: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_unknown_author")]
    pub unknown_author: String,
}

fn default_unknown_author() -> String {
    DEFAULT_UNKNOWN_AUTHOR.to_string()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            unknown_author: default_unknown_author(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub follow_links: bool,
}

fn default_workers() -> usize {
    1
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            follow_links: false,
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push(APP_DIR);
        p.push("config.toml");
        p
    })
}

/// Load config from the default path. No config directory or no file means defaults.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    match config_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Ok(AppConfig::default()),
    }
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str::<AppConfig>(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Apply `SMARTLIB_DB` and `SMARTLIB_OFFLINE` on top of a loaded config.
pub fn apply_env_overrides(cfg: &mut AppConfig) {
    if let Ok(db) = std::env::var("SMARTLIB_DB") {
        if !db.trim().is_empty() {
            cfg.store.path = Some(db);
        }
    }
    if let Ok(offline) = std::env::var("SMARTLIB_OFFLINE") {
        if matches!(offline.trim(), "1" | "true" | "yes") {
            cfg.lookup.enabled = false;
        }
    }
}

/// Where the book store lives: configured path, else the platform data dir.
pub fn store_path(cfg: &StoreConfig) -> Result<PathBuf, ConfigError> {
    if let Some(p) = &cfg.path {
        return Ok(PathBuf::from(p));
    }
    dirs::data_local_dir()
        .map(|p| p.join(APP_DIR).join("library.db"))
        .ok_or(ConfigError::NoDirectory("data"))
}
