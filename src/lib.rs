//! Site-Mirror: a rendering website mirror
//!
//! This crate crawls a single website from a seed URL, renders every page in a
//! headless browser, and writes each same-origin resource it observes into a
//! local mirror directory that can be exported as a zip archive.

pub mod config;
pub mod crawler;
pub mod output;
pub mod render;
pub mod server;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Mirror operations
///
/// Only the variants that stop a crawl before or around its work are
/// represented here. Per-page render failures and per-resource write failures
/// are counted in [`output::CrawlStats`] instead of being propagated.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Malformed seed URL '{url}': {source}")]
    MalformedSeed {
        url: String,
        #[source]
        source: UrlError,
    },

    #[error("Failed to launch render context: {0}")]
    FatalLaunch(#[source] render::RenderError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Archive error: {0}")]
    Archive(#[from] output::ArchiveError),

    #[error("Crawl of {origin} aborted: {message}")]
    Internal { origin: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Site-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport, Frontier};
pub use output::CrawlStats;
pub use url::{normalize_url, Origin};
