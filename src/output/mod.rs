//! Output module for crawl results
//!
//! This module handles:
//! - Recording and printing crawl statistics
//! - Exporting mirror directories as zip archives

mod archive;
pub mod stats;

pub use archive::{zip_directory, ArchiveError};
pub use stats::{print_statistics, CrawlStats, PageFailure};
