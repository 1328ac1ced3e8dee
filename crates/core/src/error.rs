/// Top-level error type. Every fallible public API converts into this.
#[derive(Debug, thiserror::Error)]
pub enum SmartLibError {
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    #[error("Metadata lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("Path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_kb}KB, exceeding limit of {limit_kb}KB")]
    OversizedResource {
        name: String,
        size_kb: u64,
        limit_kb: u64,
    },
}

/// Failure to read embedded metadata from a document (source unavailable).
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Malformed {format} file: {detail}")]
    MalformedFile { format: String, detail: String },

    #[error("Missing required content: {0}")]
    MissingContent(String),

    #[error("Parser panicked while reading {0}")]
    Panicked(String),

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a remote bibliographic provider. "No results" is not an error.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Network error from {provider}: {message}")]
    Network { provider: String, message: String },

    #[error("Provider {provider} returned HTTP {status}")]
    Status { provider: String, status: u16 },

    #[error("Provider {provider} returned a malformed response: {message}")]
    Malformed { provider: String, message: String },

    #[error("All {count} provider(s) failed; last error: {last}")]
    Unavailable { count: usize, last: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Refusing to store record with empty {field}")]
    InvalidRecord { field: &'static str },

    #[error("Store location {path} is not usable: {source}")]
    Location {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid root folder {path}: {reason}")]
    InvalidRoot { path: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Unknown lookup provider: {0}")]
    UnknownProvider(String),

    #[error("Could not build HTTP client: {0}")]
    HttpClient(String),

    #[error("Could not determine {0} directory")]
    NoDirectory(&'static str),
}
