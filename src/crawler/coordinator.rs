//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the entry point of one crawl job:
//! - Validating the seed and deriving the crawl origin
//! - Resetting the mirror directory
//! - Acquiring the render context and driving the dispatcher
//! - Releasing the render context no matter how the dispatcher ended

use crate::config::{Config, CrawlerConfig};
use crate::crawler::{Dispatcher, Frontier};
use crate::output::CrawlStats;
use crate::render::{build_backend, RenderBackend};
use crate::storage::{MirrorRoot, ResourceWriter};
use crate::url::{normalize_url, Origin};
use crate::{MirrorError, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

/// Outcome of a finished crawl
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    /// Identity of the crawl; its host names the mirror directory
    pub origin: Origin,

    /// The normalized seed URL
    pub seed: String,

    pub mirror_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: CrawlStats,
}

impl CrawlReport {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Normalizes a seed URL and derives its origin
///
/// # Example
///
/// ```
/// use site_mirror::crawler::parse_seed;
///
/// let (seed, origin) = parse_seed("https://Example.com/docs#intro").unwrap();
/// assert_eq!(seed.as_str(), "https://example.com/docs");
/// assert_eq!(origin.host(), "example.com");
///
/// assert!(parse_seed("not a url").is_err());
/// ```
pub fn parse_seed(seed: &str) -> Result<(Url, Origin)> {
    let malformed = |source| MirrorError::MalformedSeed {
        url: seed.to_string(),
        source,
    };

    let url = normalize_url(seed).map_err(malformed)?;
    let origin = Origin::from_url(&url).map_err(malformed)?;
    Ok((url, origin))
}

/// Main crawler coordinator structure
///
/// A coordinator is cheap to share: each call to [`Coordinator::run`] is an
/// independent crawl job with its own frontier and render context.
pub struct Coordinator {
    config: CrawlerConfig,
    backend: Arc<dyn RenderBackend>,
    root: MirrorRoot,
}

impl Coordinator {
    pub fn new(config: CrawlerConfig, backend: Arc<dyn RenderBackend>, root: MirrorRoot) -> Self {
        Self {
            config,
            backend,
            root,
        }
    }

    /// Builds a coordinator with the configured render backend and backups directory
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.crawler.clone(),
            build_backend(&config.render),
            MirrorRoot::new(&config.output.backups_dir),
        )
    }

    pub fn mirror_root(&self) -> &MirrorRoot {
        &self.root
    }

    /// Mirrors the site reachable from `seed`
    ///
    /// # Steps
    ///
    /// 1. Normalize the seed (`MalformedSeed` on failure)
    /// 2. Reset `<backups>/<host>` to an empty directory
    /// 3. Launch one render context (`FatalLaunch` on failure)
    /// 4. Seed the frontier and run the dispatcher to completion
    /// 5. Close the render context, even if the dispatcher panicked
    ///
    /// Per-page and per-resource failures never fail the crawl; they are
    /// counted in the report's statistics.
    pub async fn run(&self, seed: &str) -> Result<CrawlReport> {
        let (seed, origin) = parse_seed(seed)?;

        let mirror_dir = self.root.reset(origin.host()).await?;
        tracing::info!(
            "Mirroring {} into {} (max {} pages, {} concurrent, {} backend)",
            seed,
            mirror_dir.display(),
            self.config.max_pages,
            self.config.max_concurrent,
            self.backend.name()
        );

        let context = self
            .backend
            .launch()
            .await
            .map_err(MirrorError::FatalLaunch)?;

        let started_at = Utc::now();
        let frontier = Arc::new(Frontier::new(self.config.max_pages));
        frontier.offer(seed.clone());

        let writer = Arc::new(ResourceWriter::new(origin.clone(), mirror_dir.clone()));
        let dispatcher = Dispatcher::new(
            frontier,
            Arc::clone(&context),
            writer,
            origin.clone(),
            self.config.max_concurrent,
        );

        let outcome = AssertUnwindSafe(dispatcher.run()).catch_unwind().await;
        context.close().await;

        let stats = outcome.map_err(|panic| MirrorError::Internal {
            origin: origin.to_string(),
            message: panic_message(panic.as_ref()),
        })?;

        let report = CrawlReport {
            origin,
            seed: seed.to_string(),
            mirror_dir,
            started_at,
            finished_at: Utc::now(),
            stats,
        };

        tracing::info!(
            "Crawl of {} completed: {} pages rendered, {} failed, {} resources written in {}ms",
            report.origin,
            report.stats.pages_rendered,
            report.stats.render_errors,
            report.stats.resources_written,
            report.duration().num_milliseconds()
        );

        Ok(report)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "dispatcher panicked".to_string()
    }
}
