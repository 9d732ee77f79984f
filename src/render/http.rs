//! Plain HTTP render backend
//!
//! Fetches the document with reqwest, parses it with scraper, then fetches
//! every same-origin subresource the markup references. No JavaScript runs,
//! so links injected client-side are not discovered.

use crate::config::RenderConfig;
use crate::render::links::parse_html;
use crate::render::{millis, CapturedResource, RenderBackend, RenderContext, RenderError, RenderedPage};
use crate::url::{same_origin_links, Origin};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{header::CONTENT_TYPE, Client};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Subresource fetches in flight per page
const ASSET_FETCH_CONCURRENCY: usize = 4;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend performing plain HTTP fetches
pub struct HttpBackend {
    config: RenderConfig,
}

impl HttpBackend {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

/// Builds an HTTP client with the configured user agent and timeouts
///
/// # Example
///
/// ```
/// use site_mirror::config::RenderConfig;
/// use site_mirror::render::build_http_client;
///
/// let client = build_http_client(&RenderConfig::default());
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &RenderConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(millis(config.navigation_timeout))
        .connect_timeout(CONNECT_TIMEOUT)
        .gzip(true)
        .brotli(true)
        .build()
}

#[async_trait]
impl RenderBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn launch(&self) -> Result<Arc<dyn RenderContext>, RenderError> {
        let client =
            build_http_client(&self.config).map_err(|e| RenderError::Launch(e.to_string()))?;

        Ok(Arc::new(HttpContext {
            client,
            timeout: millis(self.config.navigation_timeout),
            closed: AtomicBool::new(false),
        }))
    }
}

struct HttpContext {
    client: Client,
    timeout: Duration,
    closed: AtomicBool,
}

#[async_trait]
impl RenderContext for HttpContext {
    async fn render(&self, url: &Url, origin: &Origin) -> Result<RenderedPage, RenderError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RenderError::ContextClosed);
        }

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_error(url, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, self.timeout, e))?;

        let is_html = is_html_document(content_type.as_deref(), &body);
        let content = String::from_utf8_lossy(&body).into_owned();
        let mut resources = Vec::new();

        if !is_html {
            resources.push(CapturedResource::new(url.clone(), body.to_vec()));
            return Ok(RenderedPage {
                content,
                resources,
                links: Vec::new(),
            });
        }

        // A redirected document is also observed under its final URL
        if final_url != *url {
            resources.push(CapturedResource::new(final_url.clone(), body.to_vec()));
        }

        let parsed = parse_html(&content, &final_url);
        let assets = same_origin_links(&parsed.assets, origin);
        resources.extend(self.fetch_assets(assets).await);

        resources.push(CapturedResource::new(url.clone(), body.to_vec()));

        Ok(RenderedPage {
            links: same_origin_links(&parsed.links, origin),
            content,
            resources,
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl HttpContext {
    /// Fetches subresources; failures are logged and skipped
    async fn fetch_assets(&self, assets: Vec<Url>) -> Vec<CapturedResource> {
        stream::iter(assets)
            .map(|asset| async move {
                match self.fetch_asset(&asset).await {
                    Ok(body) => Some(CapturedResource::new(asset, body)),
                    Err(e) => {
                        tracing::debug!("Skipping subresource: {}", e);
                        None
                    }
                }
            })
            .buffer_unordered(ASSET_FETCH_CONCURRENCY)
            .filter_map(|resource| async move { resource })
            .collect()
            .await
    }

    async fn fetch_asset(&self, url: &Url) -> Result<Vec<u8>, RenderError> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| classify_error(url, self.timeout, e))?;

        if !response.status().is_success() {
            return Err(RenderError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify_error(url, self.timeout, e))?;
        Ok(body.to_vec())
    }
}

/// Decides from the Content-Type, or from the body when the header is absent
fn is_html_document(content_type: Option<&str>, body: &[u8]) -> bool {
    match content_type.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value.to_ascii_lowercase().contains("text/html"),
        None => sniff_html(body),
    }
}

fn sniff_html(body: &[u8]) -> bool {
    let head = &body[..body.len().min(512)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start().to_ascii_lowercase();
    text.starts_with("<!doctype html") || text.starts_with("<html")
}

fn classify_error(url: &Url, timeout: Duration, error: reqwest::Error) -> RenderError {
    if error.is_timeout() {
        RenderError::Timeout {
            url: url.to_string(),
            after: timeout,
        }
    } else if error.is_connect() {
        RenderError::Navigation {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        RenderError::Navigation {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}
