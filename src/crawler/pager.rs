//! Paged connection reader
//!
//! Turns a node's followers or following list into a lazy sequence of
//! pages. Each page is requested only when the caller asks for it, so
//! callers can record every page before the next one is fetched.

use crate::remote::ProfileSource;
use crate::state::Direction;
use crate::storage::normalize_username;
use crate::FetchResult;

/// Lazy, finite, non-restartable reader over one relationship direction
pub struct ConnectionPager<'a> {
    source: &'a dyn ProfileSource,
    username: String,
    direction: Direction,
    page_size: u32,
    next_page: u32,
    max_pages: Option<u32>,
    exhausted: bool,
}

impl<'a> ConnectionPager<'a> {
    /// Creates a pager starting at the first page
    ///
    /// `max_pages` optionally caps how many pages are read.
    pub fn new(
        source: &'a dyn ProfileSource,
        username: &str,
        direction: Direction,
        page_size: u32,
        max_pages: Option<u32>,
    ) -> Self {
        Self {
            source,
            username: username.to_string(),
            direction,
            page_size: page_size.max(1),
            next_page: 1,
            max_pages,
            exhausted: false,
        }
    }

    /// Number of pages requested so far
    pub fn pages_read(&self) -> u32 {
        self.next_page - 1
    }

    /// Fetches the next page of human handles
    ///
    /// # Returns
    ///
    /// * `None` - The sequence is finished
    /// * `Some(Ok(handles))` - Lowercased handles of human accounts on this
    ///   page; may be empty when a full page held only organizations
    /// * `Some(Err(e))` - The page could not be fetched; the pager is
    ///   finished afterwards
    pub async fn next_page(&mut self) -> Option<FetchResult<Vec<String>>> {
        if self.exhausted {
            return None;
        }

        if let Some(max) = self.max_pages {
            if self.pages_read() >= max {
                tracing::debug!(
                    username = %self.username,
                    direction = %self.direction,
                    max,
                    "Page cap reached"
                );
                self.exhausted = true;
                return None;
            }
        }

        let page = self.next_page;
        self.next_page += 1;

        let items = match self
            .source
            .fetch_connections_page(&self.username, self.direction, page, self.page_size)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                self.exhausted = true;
                return Some(Err(e));
            }
        };

        // Termination is decided on the raw page, before filtering
        if items.is_empty() {
            self.exhausted = true;
            return None;
        }
        if (items.len() as u32) < self.page_size {
            self.exhausted = true;
        }

        let handles = items
            .into_iter()
            .filter(|item| item.is_human())
            .map(|item| normalize_username(&item.login))
            .collect();

        Some(Ok(handles))
    }
}
