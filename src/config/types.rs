use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Site-Mirror
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub render: RenderConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

/// Crawl limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of render tasks in flight at once
    #[serde(rename = "max-concurrent")]
    pub max_concurrent: usize,

    /// Maximum number of pages claimed in one crawl
    #[serde(rename = "max-pages")]
    pub max_pages: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_pages: 20,
        }
    }
}

/// Which render backend performs page loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderBackendKind {
    /// Headless Chrome over the DevTools protocol; executes JavaScript
    #[default]
    Chrome,
    /// Plain HTTP fetches; no JavaScript
    Http,
}

/// Page rendering configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub backend: RenderBackendKind,

    /// Upper bound for the initial navigation (milliseconds)
    #[serde(rename = "navigation-timeout")]
    pub navigation_timeout: u64,

    /// Quiet window that counts as "network settled" (milliseconds)
    #[serde(rename = "network-idle")]
    pub network_idle: u64,

    /// Upper bound for waiting on the network to settle (milliseconds)
    #[serde(rename = "settle-timeout")]
    pub settle_timeout: u64,

    /// Chrome/Chromium binary; auto-detected when absent
    #[serde(rename = "chrome-executable")]
    pub chrome_executable: Option<PathBuf>,

    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            backend: RenderBackendKind::Chrome,
            navigation_timeout: 30_000,
            network_idle: 500,
            settle_timeout: 30_000,
            chrome_executable: None,
            user_agent: format!("site-mirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding one mirror directory per origin host
    #[serde(rename = "backups-dir")]
    pub backups_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backups_dir: PathBuf::from("backups"),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Directory of static files served for unmatched paths
    #[serde(rename = "static-dir")]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            static_dir: Some(PathBuf::from("public")),
        }
    }
}
