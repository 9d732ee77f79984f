//! Crawler module for mirroring a site
//!
//! This module contains the core crawling logic, including:
//! - The frontier of pages waiting to be rendered
//! - The bounded pool of render tasks
//! - Overall crawl coordination

mod coordinator;
mod dispatcher;
mod frontier;

pub use coordinator::{parse_seed, Coordinator, CrawlReport};
pub use dispatcher::Dispatcher;
pub use frontier::Frontier;

use crate::config::Config;
use crate::Result;

/// Runs a complete crawl operation
///
/// This is the one-shot entry point used by the CLI. It will:
/// 1. Build the render backend selected in the configuration
/// 2. Reset the mirror directory for the seed's host
/// 3. Render pages until the frontier is exhausted or the page budget is used
/// 4. Return the crawl report
///
/// # Example
///
/// ```no_run
/// use site_mirror::config::Config;
/// use site_mirror::crawler::crawl;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let report = crawl(&Config::default(), "https://example.com/").await?;
/// println!("{} pages rendered", report.stats.pages_rendered);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: &Config, seed: &str) -> Result<CrawlReport> {
    Coordinator::from_config(config).run(seed).await
}
