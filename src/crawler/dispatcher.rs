//! Render task dispatcher
//!
//! Drives a crawl to completion with a bounded pool of render tasks. Each
//! round claims as many pages as the pool has free slots, so the number of
//! tasks alive never exceeds `max_concurrent`. A task renders its page,
//! writes the captured resources, and offers the page's links back to the
//! frontier before it finishes.

use crate::crawler::Frontier;
use crate::output::CrawlStats;
use crate::render::RenderContext;
use crate::storage::{ResourceWriter, SaveTally};
use crate::url::Origin;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

/// Pages between progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// What a render task reports back
struct PageOutcome {
    url: Url,
    result: Result<PageSummary, String>,
}

struct PageSummary {
    tally: SaveTally,
    links_discovered: usize,
    links_queued: usize,
}

/// Everything a render task needs, shared by all tasks of one crawl
#[derive(Clone)]
struct TaskContext {
    frontier: Arc<Frontier>,
    renderer: Arc<dyn RenderContext>,
    writer: Arc<ResourceWriter>,
    origin: Arc<Origin>,
}

/// Bounded pool of render tasks working off one frontier
pub struct Dispatcher {
    shared: TaskContext,
    max_concurrent: usize,
}

impl Dispatcher {
    pub fn new(
        frontier: Arc<Frontier>,
        renderer: Arc<dyn RenderContext>,
        writer: Arc<ResourceWriter>,
        origin: Origin,
        max_concurrent: usize,
    ) -> Self {
        Self {
            shared: TaskContext {
                frontier,
                renderer,
                writer,
                origin: Arc::new(origin),
            },
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs until the frontier is exhausted and no task is in flight
    ///
    /// Per-page failures, including panicking render tasks, are counted and
    /// never retried.
    pub async fn run(self) -> CrawlStats {
        let mut stats = CrawlStats::default();
        let mut tasks: JoinSet<PageOutcome> = JoinSet::new();
        let started = Instant::now();

        loop {
            let free = self.max_concurrent.saturating_sub(tasks.len());
            for url in self.shared.frontier.claim_next_batch(free) {
                stats.pages_claimed += 1;
                tracing::debug!("Rendering {}", url);
                tasks.spawn(render_task(self.shared.clone(), url));
            }

            let Some(joined) = tasks.join_next().await else {
                if self.shared.frontier.is_exhausted() {
                    break;
                }
                continue;
            };

            match joined {
                Ok(PageOutcome {
                    url,
                    result: Ok(summary),
                }) => {
                    tracing::debug!(
                        "Rendered {}: {} resources written, {} new links",
                        url,
                        summary.tally.written,
                        summary.links_queued
                    );
                    stats.record_page(
                        summary.tally,
                        summary.links_discovered,
                        summary.links_queued,
                    );
                }
                Ok(PageOutcome {
                    url,
                    result: Err(error),
                }) => {
                    tracing::warn!("Failed to render {}: {}", url, error);
                    stats.record_failure(url.as_str(), error);
                }
                Err(e) => {
                    tracing::error!("Render task did not complete: {}", e);
                    stats.record_failure("", e);
                }
            }

            let finished = stats.pages_rendered + stats.render_errors;
            if finished % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    "Progress: {} pages done, {} in flight, {} queued, {:.2} pages/sec",
                    finished,
                    tasks.len(),
                    self.shared.frontier.pending_len(),
                    finished as f64 / started.elapsed().as_secs_f64()
                );
            }
        }

        stats
    }
}

async fn render_task(shared: TaskContext, url: Url) -> PageOutcome {
    let result = AssertUnwindSafe(process_page(&shared, &url))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err("render task panicked".to_string()));

    PageOutcome { url, result }
}

/// Renders one page, persists its resources, and feeds its links back
async fn process_page(shared: &TaskContext, url: &Url) -> Result<PageSummary, String> {
    let page = shared
        .renderer
        .render(url, &shared.origin)
        .await
        .map_err(|e| e.to_string())?;

    let tally = shared.writer.save_all(&page.resources).await;

    let links_discovered = page.links.len();
    let links_queued = page
        .links
        .into_iter()
        .filter(|link| shared.origin.contains(link))
        .map(|link| shared.frontier.offer(link))
        .filter(|queued| *queued)
        .count();

    Ok(PageSummary {
        tally,
        links_discovered,
        links_queued,
    })
}
