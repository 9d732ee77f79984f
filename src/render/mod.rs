//! Page rendering
//!
//! This module wraps the capability that actually loads pages:
//! - [`RenderBackend`] acquires one [`RenderContext`] per crawl
//! - [`RenderContext::render`] loads one URL in an isolated browsing context
//!   and reports every response it observed plus the page's same-origin links
//!
//! Two backends are provided: [`ChromeBackend`] drives headless Chrome and
//! executes client-side JavaScript; [`HttpBackend`] performs plain HTTP
//! fetches for sites that do not need it.

mod chrome;
mod http;
mod links;

pub use chrome::ChromeBackend;
pub use http::{build_http_client, HttpBackend};
pub use links::{extract_links_simple, parse_html, ParsedPage};

use crate::config::{RenderBackendKind, RenderConfig};
use crate::url::{extract_host, Origin};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Capacity of the per-render channel carrying captured responses
pub const RESOURCE_CHANNEL_CAPACITY: usize = 64;

/// One network response observed while rendering a page
#[derive(Debug, Clone)]
pub struct CapturedResource {
    /// URL the response was delivered for
    pub url: Url,

    /// Lowercase host of `url`; empty for host-less URLs such as `data:`
    pub origin_host: String,

    /// Response body
    pub body: Vec<u8>,
}

impl CapturedResource {
    pub fn new(url: Url, body: Vec<u8>) -> Self {
        let origin_host = extract_host(&url).unwrap_or_default();
        Self {
            url,
            origin_host,
            body,
        }
    }
}

/// Result of a successful render
#[derive(Debug, Clone, Default)]
pub struct RenderedPage {
    /// Final serialized DOM (or raw body for non-HTML documents)
    pub content: String,

    /// Every captured response, ending with the rendered document itself
    pub resources: Vec<CapturedResource>,

    /// Unique same-origin links found in the rendered page
    pub links: Vec<Url>,
}

/// Errors raised by render backends
///
/// Everything except [`RenderError::Launch`] is scoped to a single page and
/// is absorbed by the dispatcher.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch renderer: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Browser(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Timed out after {after:?} while loading {url}")]
    Timeout { url: String, after: Duration },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Render context already closed")]
    ContextClosed,
}

/// Acquires render contexts
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Acquires a context that lives for one whole crawl
    async fn launch(&self) -> Result<Arc<dyn RenderContext>, RenderError>;
}

/// A render-capable environment shared by all render tasks of one crawl
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Loads `url` in a fresh isolated browsing context
    ///
    /// On error no resources are returned, and the browsing context opened
    /// for this call has been released.
    async fn render(&self, url: &Url, origin: &Origin) -> Result<RenderedPage, RenderError>;

    /// Releases the context; later `render` calls fail with `ContextClosed`
    async fn close(&self);
}

/// Builds the backend selected in the configuration
pub fn build_backend(config: &RenderConfig) -> Arc<dyn RenderBackend> {
    match config.backend {
        RenderBackendKind::Chrome => Arc::new(ChromeBackend::new(config.clone())),
        RenderBackendKind::Http => Arc::new(HttpBackend::new(config.clone())),
    }
}

pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
