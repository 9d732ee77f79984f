//! Crawl frontier
//!
//! The frontier is the only shared mutable structure of a crawl. It holds the
//! FIFO queue of pages waiting to be rendered and the set of pages already
//! claimed for rendering, and enforces the page budget:
//! - A URL is claimed at most once per crawl
//! - At most `max_pages` URLs are ever claimed
//! - The pending queue never holds more entries than the remaining budget

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

#[derive(Debug, Default)]
struct FrontierState {
    /// Pages waiting to be claimed, in discovery order
    pending: VecDeque<Url>,

    /// Keys of `pending`, for duplicate detection
    pending_set: HashSet<String>,

    /// Keys of every page handed out by `claim_next_batch`
    claimed: HashSet<String>,
}

/// Shared queue of pages to render, bounded by a page budget
#[derive(Debug)]
pub struct Frontier {
    max_pages: usize,
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages,
            state: Mutex::new(FrontierState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Offers a normalized URL for rendering
    ///
    /// The URL is enqueued only if it was never claimed, is not already
    /// pending, and the budget still has room for it. Offering the same URL
    /// again is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if the URL was enqueued
    ///
    /// # Example
    ///
    /// ```
    /// use site_mirror::crawler::Frontier;
    /// use url::Url;
    ///
    /// let frontier = Frontier::new(10);
    /// let url = Url::parse("https://example.com/").unwrap();
    /// assert!(frontier.offer(url.clone()));
    /// assert!(!frontier.offer(url));
    /// ```
    pub fn offer(&self, url: Url) -> bool {
        let key = url.as_str().to_string();
        let mut state = self.lock();

        if state.claimed.contains(&key) || state.pending_set.contains(&key) {
            return false;
        }

        if state.claimed.len() + state.pending.len() >= self.max_pages {
            tracing::trace!("Page budget full, not queueing {}", url);
            return false;
        }

        state.pending_set.insert(key);
        state.pending.push_back(url);
        true
    }

    /// Claims up to `max_size` pending URLs in FIFO order
    ///
    /// Each returned URL is marked claimed and will never be returned again.
    /// Once the page budget is used up, the rest of the queue is discarded.
    pub fn claim_next_batch(&self, max_size: usize) -> Vec<Url> {
        let mut state = self.lock();
        let remaining = self.max_pages.saturating_sub(state.claimed.len());
        let take = max_size.min(remaining).min(state.pending.len());

        let mut batch = Vec::with_capacity(take);
        for _ in 0..take {
            let Some(url) = state.pending.pop_front() else {
                break;
            };
            let key = url.as_str().to_string();
            state.pending_set.remove(&key);
            state.claimed.insert(key);
            batch.push(url);
        }

        if state.claimed.len() >= self.max_pages && !state.pending.is_empty() {
            tracing::debug!(
                "Page budget of {} reached, dropping {} pending pages",
                self.max_pages,
                state.pending.len()
            );
            state.pending.clear();
            state.pending_set.clear();
        }

        batch
    }

    /// True when nothing more can be claimed
    pub fn is_exhausted(&self) -> bool {
        let state = self.lock();
        state.pending.is_empty() || state.claimed.len() >= self.max_pages
    }

    pub fn claimed_count(&self) -> usize {
        self.lock().claimed.len()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn is_claimed(&self, url: &Url) -> bool {
        self.lock().claimed.contains(url.as_str())
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }
}
