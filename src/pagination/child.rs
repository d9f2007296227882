//! Single-page child ranges produced by a split

use super::types::{LoadedPage, PageSource};
use crate::error::Result;
use crate::types::PageRequest;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Exactly one page of work, split off a [`super::PageCursor`]
///
/// A child fetches its page once, hands every item to the consumer and
/// then reports that nothing remains. It never splits further.
pub struct ChildRange<P, T> {
    source: Arc<PageSource<P, T>>,
    page_index: u64,
    page_size: u64,
    prefetched: Mutex<Option<Vec<T>>>,
    consumed: AtomicBool,
}

impl<P, T> ChildRange<P, T> {
    pub(crate) fn new(source: Arc<PageSource<P, T>>, page_index: u64, page_size: u64) -> Self {
        Self {
            source,
            page_index,
            page_size,
            prefetched: Mutex::new(None),
            consumed: AtomicBool::new(false),
        }
    }

    /// Child whose page was already fetched during discovery
    pub(crate) fn prefetched(
        source: Arc<PageSource<P, T>>,
        page_index: u64,
        page_size: u64,
        page: LoadedPage<T>,
    ) -> Self {
        Self {
            prefetched: Mutex::new(Some(page.items)),
            ..Self::new(source, page_index, page_size)
        }
    }

    /// Index of the page this child covers
    pub fn page_index(&self) -> u64 {
        self.page_index
    }

    /// Page size shared with the parent cursor
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Whether the page is held in memory from the discovery prefetch
    pub fn is_prefetched(&self) -> bool {
        self.prefetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Whether the page was already handed to a consumer
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }

    /// Deliver this child's page; always reports no further pages
    pub fn advance_one(&self, consume: &mut dyn FnMut(T)) -> Result<bool> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }

        let cached = self
            .prefetched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let items = match cached {
            Some(items) => items,
            None => {
                self.source
                    .load(PageRequest::new(self.page_index, self.page_size))?
                    .items
            }
        };

        tracing::trace!(page = self.page_index, items = items.len(), "Child page consumed");
        items.into_iter().for_each(consume);
        Ok(false)
    }

    /// Children never split
    pub fn split(&self) -> Option<ChildRange<P, T>> {
        None
    }

    /// Upper bound on items this child yields
    pub fn estimate_size(&self) -> u64 {
        match &*self.prefetched.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(items) => items.len() as u64,
            None if self.is_consumed() => 0,
            None => self.page_size,
        }
    }
}

impl<P, T> fmt::Debug for ChildRange<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChildRange")
            .field("page_index", &self.page_index)
            .field("page_size", &self.page_size)
            .field("prefetched", &self.is_prefetched())
            .field("consumed", &self.is_consumed())
            .finish()
    }
}
