//! Prefetch cache for bound discovery
//!
//! A discovering cursor fetches its first page early to learn the total
//! page count. The page is kept here until exactly one consumer claims it:
//! either the cursor's own sequential advance or the first child split off.
//! When the sequential advance reaches the first page before any split, the
//! total is learned from that fetch and the cache starts out consumed.

use super::types::LoadedPage;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// First page fetched during discovery, plus the total it reported
pub struct PrefetchCache<T> {
    page_index: u64,
    total_pages: u64,
    page: Mutex<Option<LoadedPage<T>>>,
}

impl<T> PrefetchCache<T> {
    pub(crate) fn new(page_index: u64, total_pages: u64, page: LoadedPage<T>) -> Self {
        Self {
            page_index,
            total_pages,
            page: Mutex::new(Some(page)),
        }
    }

    /// Cache for a page the sequential advance already delivered
    pub(crate) fn consumed(page_index: u64, total_pages: u64) -> Self {
        Self {
            page_index,
            total_pages,
            page: Mutex::new(None),
        }
    }

    /// Index of the cached page
    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    /// Total pages reported by the cached page
    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    /// Whether the cached items were handed to a consumer
    pub fn is_consumed(&self) -> bool {
        self.page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Hand the cached page to whoever claimed `page_index`
    pub(crate) fn take(&self, page_index: u64) -> Option<LoadedPage<T>> {
        if page_index != self.page_index {
            return None;
        }
        self.page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<T> fmt::Debug for PrefetchCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefetchCache")
            .field("page_index", &self.page_index)
            .field("total_pages", &self.total_pages)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}
