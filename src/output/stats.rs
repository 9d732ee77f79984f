//! Crawl statistics
//!
//! This module provides the counters accumulated while a crawl runs and the
//! functionality for displaying them.

use crate::storage::SaveTally;
use serde::Serialize;

/// Failures kept verbatim in the statistics; the rest are only counted
pub const MAX_RECORDED_FAILURES: usize = 20;

/// A page whose render failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub url: String,
    pub error: String,
}

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    /// Pages taken from the frontier
    pub pages_claimed: usize,

    /// Pages rendered successfully
    pub pages_rendered: usize,

    /// Pages whose render failed (including panicked render tasks)
    pub render_errors: usize,

    /// Same-origin links reported by rendered pages
    pub links_discovered: usize,

    /// Links accepted into the frontier
    pub links_queued: usize,

    /// Resources written into the mirror
    pub resources_written: usize,

    /// Resources dropped because they came from another host
    pub resources_off_origin: usize,

    /// Resources that could not be written
    pub persistence_errors: usize,

    /// Writes that replaced a different URL's file
    pub aliased_overwrites: usize,

    /// The first failed pages, in completion order
    pub failures: Vec<PageFailure>,
}

impl CrawlStats {
    /// Records a successful render
    pub fn record_page(&mut self, tally: SaveTally, links_discovered: usize, links_queued: usize) {
        self.pages_rendered += 1;
        self.links_discovered += links_discovered;
        self.links_queued += links_queued;
        self.resources_written += tally.written;
        self.resources_off_origin += tally.off_origin;
        self.persistence_errors += tally.failed;
        self.aliased_overwrites += tally.aliased;
    }

    /// Records a failed render
    pub fn record_failure(&mut self, url: impl Into<String>, error: impl ToString) {
        self.render_errors += 1;
        if self.failures.len() < MAX_RECORDED_FAILURES {
            self.failures.push(PageFailure {
                url: url.into(),
                error: error.to_string(),
            });
        }
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStats) {
    println!("=== Crawl Statistics ===\n");

    println!("Pages:");
    println!("  Claimed: {}", stats.pages_claimed);
    println!("  Rendered: {}", stats.pages_rendered);
    println!("  Failed: {}", stats.render_errors);
    println!();

    println!("Links:");
    println!("  Same-origin links found: {}", stats.links_discovered);
    println!("  Queued for rendering: {}", stats.links_queued);
    println!();

    println!("Resources:");
    println!("  Written: {}", stats.resources_written);
    println!("  Off-origin (skipped): {}", stats.resources_off_origin);
    println!("  Write errors: {}", stats.persistence_errors);
    if stats.aliased_overwrites > 0 {
        println!("  Overwritten by another URL: {}", stats.aliased_overwrites);
    }
    println!();

    if !stats.failures.is_empty() {
        println!("Failed Pages:");
        for failure in &stats.failures {
            println!("  - {}: {}", failure.url, failure.error);
        }
        if stats.render_errors > stats.failures.len() {
            println!(
                "  ... and {} more",
                stats.render_errors - stats.failures.len()
            );
        }
        println!();
    }

    let success_rate = if stats.pages_claimed > 0 {
        (stats.pages_rendered as f64 / stats.pages_claimed as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages rendered)",
        success_rate, stats.pages_rendered, stats.pages_claimed
    );
}
