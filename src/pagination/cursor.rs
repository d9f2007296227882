//! Page cursor: sequential advance, page-granular splitting and bound discovery
//!
//! Split layout for a cursor with four pages (top row is the page index):
//!
//! ```text
//! |   0    |   1    |   2    |   3    |
//! | Parent |        |        |        |  No splits
//! | Child  | Parent |        |        |  First split
//! | Child  | Child  | Parent |        |  Second split
//! | Child  | Child  | Child  | Parent |  Third split
//!                                        No more splits
//! ```
//!
//! Run sequentially, a cursor is never split and `advance_one` walks the
//! pages itself. A discovering cursor then learns its total from the first
//! page it advances over.

use super::child::ChildRange;
use super::prefetch::PrefetchCache;
use super::types::{
    BoundPolicy, CountSupplier, ItemExtractor, LastPageSignal, LoadedPage, PageFetcher,
    PageResultItems, PageSource, TotalPagesExtractor,
};
use crate::error::{Error, Result};
use crate::types::{PageRequest, PageResult};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Resolved form of a [`BoundPolicy`]
enum Bound<P, T> {
    Items(u64),
    Pages(u64),
    Lazy {
        supplier: Box<dyn CountSupplier>,
        count: OnceCell<u64>,
    },
    Discover {
        extractor: Box<dyn TotalPagesExtractor<P>>,
        cache: OnceCell<PrefetchCache<T>>,
    },
}

impl<P, T> Bound<P, T> {
    fn from_policy(policy: BoundPolicy<P>) -> Result<Self> {
        Ok(match policy {
            BoundPolicy::ExactItemCount(n) => Self::Items(n),
            BoundPolicy::ExactPageCount(n) => Self::Pages(n),
            BoundPolicy::LazyItemCount(supplier) => Self::Lazy {
                supplier,
                count: OnceCell::new(),
            },
            BoundPolicy::Discover(Some(extractor)) => Self::Discover {
                extractor,
                cache: OnceCell::new(),
            },
            BoundPolicy::Discover(None) => return Err(Error::MissingTotalPagesExtractor),
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Items(_) => "exact_items",
            Self::Pages(_) => "exact_pages",
            Self::Lazy { .. } => "lazy_items",
            Self::Discover { .. } => "discover",
        }
    }
}

/// Cursor over a paginated source
///
/// All operations take `&self`: the page index is an atomic counter so a
/// worker splitting the cursor and another advancing it never claim the
/// same page.
pub struct PageCursor<P, T> {
    source: Arc<PageSource<P, T>>,
    page_size: u64,
    page_index: AtomicU64,
    finished: AtomicBool,
    bound: Bound<P, T>,
}

impl<P, T> PageCursor<P, T> {
    /// Start building a cursor
    pub fn builder(
        page_size: u64,
        fetcher: impl PageFetcher<P> + 'static,
        items: impl ItemExtractor<P, T> + 'static,
        bound: BoundPolicy<P>,
    ) -> PageCursorBuilder<P, T> {
        PageCursorBuilder {
            page_size,
            start_page: 0,
            fetcher: Box::new(fetcher),
            items: Box::new(items),
            bound,
            signal: LastPageSignal::ShortPage,
        }
    }

    /// Build a cursor starting at page 0 with the short-page signal
    pub fn new(
        page_size: u64,
        fetcher: impl PageFetcher<P> + 'static,
        items: impl ItemExtractor<P, T> + 'static,
        bound: BoundPolicy<P>,
    ) -> Result<Self> {
        Self::builder(page_size, fetcher, items, bound).build()
    }

    /// Items per page
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Next page this cursor will claim
    pub fn page_index(&self) -> u64 {
        self.page_index.load(Ordering::Acquire)
    }

    /// Whether termination has been detected
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Name of the bound policy this cursor was built with
    pub fn bound_kind(&self) -> &'static str {
        self.bound.kind()
    }

    /// Discovery cache, once populated
    pub fn prefetch_cache(&self) -> Option<&PrefetchCache<T>> {
        match &self.bound {
            Bound::Discover { cache, .. } => cache.get(),
            _ => None,
        }
    }

    /// Total pages learned by discovery, if it has happened
    pub fn discovered_total_pages(&self) -> Option<u64> {
        self.prefetch_cache().map(PrefetchCache::total_pages)
    }

    /// Fetch the current page, hand its items to `consume` and move on
    ///
    /// Returns `false` once the last page has been delivered. A failed
    /// fetch finishes the cursor; items already delivered stay delivered.
    pub fn advance_one(&self, consume: &mut dyn FnMut(T)) -> Result<bool> {
        if self.is_finished() {
            return Ok(false);
        }

        let index = self.page_index.fetch_add(1, Ordering::AcqRel);
        let page = match self.load_claimed(index) {
            Ok(page) => page,
            Err(e) => {
                self.finished.store(true, Ordering::Release);
                return Err(e);
            }
        };

        let last_page = self.source.is_last_page(&page, self.page_size);
        let count = page.items.len();
        page.items.into_iter().for_each(consume);

        let exhausted = match self.bound_reached(index + 1) {
            Ok(reached) => last_page || reached,
            Err(e) => {
                self.finished.store(true, Ordering::Release);
                return Err(e);
            }
        };
        if exhausted {
            self.finished.store(true, Ordering::Release);
        }

        tracing::debug!(page = index, items = count, exhausted, "Advanced cursor");
        Ok(!exhausted)
    }

    /// Split off the current page as a single-page child
    ///
    /// Needs the bound, so a discovering cursor prefetches on the first
    /// call. Returns `None` once the current page is the last one.
    pub fn split(&self) -> Result<Option<ChildRange<P, T>>> {
        if self.is_finished() {
            return Ok(None);
        }

        let bound = self.resolve_item_bound()?;
        let size = self.page_size;
        let claimed = self
            .page_index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |index| {
                (size.saturating_mul(index + 1) < bound).then_some(index + 1)
            });

        let Ok(index) = claimed else {
            tracing::trace!(page = self.page_index(), bound, "No further splits");
            return Ok(None);
        };

        let child = match self.take_cached(index) {
            Some(page) => ChildRange::prefetched(Arc::clone(&self.source), index, size, page),
            None => ChildRange::new(Arc::clone(&self.source), index, size),
        };
        tracing::debug!(page = index, prefetched = child.is_prefetched(), "Split off child page");
        Ok(Some(child))
    }

    /// Best known upper bound on the total item count
    pub fn estimate_size(&self) -> Result<u64> {
        self.resolve_item_bound()
    }

    /// Page for a claimed index: the discovery prefetch when it matches, a fetch otherwise
    fn load_claimed(&self, index: u64) -> Result<LoadedPage<T>> {
        if let Some(page) = self.take_cached(index) {
            tracing::trace!(page = index, "Reusing prefetched page");
            return Ok(page);
        }

        match &self.bound {
            Bound::Discover { extractor, cache } if cache.get().is_none() => {
                let page = self.source.fetch(PageRequest::new(index, self.page_size))?;
                let total_pages = extractor.total_pages(&page)?;
                let page = self.source.open(page)?;
                // A concurrent split may have discovered first; its cache stands.
                cache.get_or_init(|| {
                    tracing::debug!(page = index, total_pages, "Discovered total pages");
                    PrefetchCache::consumed(index, total_pages)
                });
                Ok(page)
            }
            _ => self.source.load(PageRequest::new(index, self.page_size)),
        }
    }

    fn take_cached(&self, index: u64) -> Option<LoadedPage<T>> {
        self.prefetch_cache().and_then(|cache| cache.take(index))
    }

    /// Item bound without forcing a discovery fetch
    fn known_item_bound(&self) -> Result<Option<u64>> {
        Ok(match &self.bound {
            Bound::Items(n) => Some(*n),
            Bound::Pages(n) => Some(n.saturating_mul(self.page_size)),
            Bound::Lazy { supplier, count } => Some(*count.get_or_try_init(|| supplier.count())?),
            Bound::Discover { cache, .. } => cache
                .get()
                .map(|c| c.total_pages().saturating_mul(self.page_size)),
        })
    }

    fn resolve_item_bound(&self) -> Result<u64> {
        match &self.bound {
            Bound::Discover { .. } => Ok(self
                .discover()?
                .total_pages()
                .saturating_mul(self.page_size)),
            _ => Ok(self.known_item_bound()?.unwrap_or(u64::MAX)),
        }
    }

    fn bound_reached(&self, next_index: u64) -> Result<bool> {
        Ok(self
            .known_item_bound()?
            .is_some_and(|bound| next_index.saturating_mul(self.page_size) >= bound))
    }

    /// Prefetch the current page exactly once to learn the total page count
    fn discover(&self) -> Result<&PrefetchCache<T>> {
        let Bound::Discover { extractor, cache } = &self.bound else {
            return Err(Error::config("cursor is not in discover mode"));
        };

        cache.get_or_try_init(|| {
            let index = self.page_index();
            let page = self.source.fetch(PageRequest::new(index, self.page_size))?;
            let total_pages = extractor.total_pages(&page)?;
            let page = self.source.open(page)?;
            tracing::debug!(page = index, total_pages, "Discovered total pages");
            Ok(PrefetchCache::new(index, total_pages, page))
        })
    }
}

impl<T> PageCursor<PageResult<T>, T> {
    /// Start building a cursor over a source that yields [`PageResult`] pages
    pub fn for_results(
        page_size: u64,
        fetcher: impl PageFetcher<PageResult<T>> + 'static,
        bound: BoundPolicy<PageResult<T>>,
    ) -> PageCursorBuilder<PageResult<T>, T> {
        Self::builder(page_size, fetcher, PageResultItems, bound)
    }
}

impl<P, T> fmt::Debug for PageCursor<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCursor")
            .field("page_size", &self.page_size)
            .field("page_index", &self.page_index())
            .field("finished", &self.is_finished())
            .field("bound", &self.bound.kind())
            .field("signal", self.source.signal())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`PageCursor`]
pub struct PageCursorBuilder<P, T> {
    page_size: u64,
    start_page: u64,
    fetcher: Box<dyn PageFetcher<P>>,
    items: Box<dyn ItemExtractor<P, T>>,
    bound: BoundPolicy<P>,
    signal: LastPageSignal<P>,
}

impl<P, T> PageCursorBuilder<P, T> {
    /// Set the first page index (default 0)
    #[must_use]
    pub fn start_page(mut self, start_page: u64) -> Self {
        self.start_page = start_page;
        self
    }

    /// Set the last-page signal (default: short page)
    #[must_use]
    pub fn last_page_signal(mut self, signal: LastPageSignal<P>) -> Self {
        self.signal = signal;
        self
    }

    /// Build the cursor; fails before any fetch on invalid configuration
    pub fn build(self) -> Result<PageCursor<P, T>> {
        if self.page_size == 0 {
            return Err(Error::InvalidPageSize);
        }
        let bound = Bound::from_policy(self.bound)?;

        tracing::debug!(
            page_size = self.page_size,
            start_page = self.start_page,
            bound = bound.kind(),
            "Built page cursor"
        );

        Ok(PageCursor {
            source: Arc::new(PageSource::new(self.fetcher, self.items, self.signal)),
            page_size: self.page_size,
            page_index: AtomicU64::new(self.start_page),
            finished: AtomicBool::new(false),
            bound,
        })
    }
}

impl<P, T> fmt::Debug for PageCursorBuilder<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageCursorBuilder")
            .field("page_size", &self.page_size)
            .field("start_page", &self.start_page)
            .field("bound", &self.bound)
            .field("signal", &self.signal)
            .finish()
    }
}
