//! Pagination types and traits
//!
//! Defines the collaborator contracts a cursor consumes (fetch, item
//! extraction, total pages, last-page flag) and the bound policies a
//! cursor is built with.

use crate::error::{Error, Result};
use crate::types::{PageRequest, PageResult};
use std::fmt;

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Retrieves one page from the backing store
///
/// Must be safe to call concurrently for distinct page indices.
pub trait PageFetcher<P>: Send + Sync {
    /// Fetch the page addressed by `request`
    fn fetch(&self, request: PageRequest) -> Result<P>;
}

impl<P, F> PageFetcher<P> for F
where
    F: Fn(PageRequest) -> Result<P> + Send + Sync,
{
    fn fetch(&self, request: PageRequest) -> Result<P> {
        self(request)
    }
}

/// Turns a fetched page into its ordered items
pub trait ItemExtractor<P, T>: Send + Sync {
    /// Extract the items of `page`, in source order
    fn extract(&self, page: P) -> Result<Vec<T>>;
}

impl<P, T, F> ItemExtractor<P, T> for F
where
    F: Fn(P) -> Result<Vec<T>> + Send + Sync,
{
    fn extract(&self, page: P) -> Result<Vec<T>> {
        self(page)
    }
}

/// Reads the total page count from the first fetched page
pub trait TotalPagesExtractor<P>: Send + Sync {
    /// Total number of pages in the result set
    fn total_pages(&self, page: &P) -> Result<u64>;
}

impl<P, F> TotalPagesExtractor<P> for F
where
    F: Fn(&P) -> Result<u64> + Send + Sync,
{
    fn total_pages(&self, page: &P) -> Result<u64> {
        self(page)
    }
}

/// Reads a backend-supplied "is last page" flag
pub trait LastPageExtractor<P>: Send + Sync {
    /// `None` when the page carries no flag
    fn is_last(&self, page: &P) -> Option<bool>;
}

impl<P, F> LastPageExtractor<P> for F
where
    F: Fn(&P) -> Option<bool> + Send + Sync,
{
    fn is_last(&self, page: &P) -> Option<bool> {
        self(page)
    }
}

/// Supplies the total item count on first need
pub trait CountSupplier: Send + Sync {
    /// Total number of items in the result set
    fn count(&self) -> Result<u64>;
}

impl<F> CountSupplier for F
where
    F: Fn() -> Result<u64> + Send + Sync,
{
    fn count(&self) -> Result<u64> {
        self()
    }
}

// ============================================================================
// PageResult Extractors
// ============================================================================

/// Item extractor for [`PageResult`] pages
#[derive(Debug, Clone, Copy, Default)]
pub struct PageResultItems;

impl<T> ItemExtractor<PageResult<T>, T> for PageResultItems {
    fn extract(&self, page: PageResult<T>) -> Result<Vec<T>> {
        Ok(page.items)
    }
}

/// Total pages extractor for [`PageResult`] pages
#[derive(Debug, Clone, Copy, Default)]
pub struct PageResultTotalPages;

impl<T> TotalPagesExtractor<PageResult<T>> for PageResultTotalPages {
    fn total_pages(&self, page: &PageResult<T>) -> Result<u64> {
        page.total_pages
            .ok_or_else(|| Error::extraction("page does not report a total page count"))
    }
}

/// Last-page flag extractor for [`PageResult`] pages
#[derive(Debug, Clone, Copy, Default)]
pub struct PageResultIsLast;

impl<T> LastPageExtractor<PageResult<T>> for PageResultIsLast {
    fn is_last(&self, page: &PageResult<T>) -> Option<bool> {
        page.is_last
    }
}

// ============================================================================
// Bound Policy
// ============================================================================

/// How a cursor learns the extent of the result set
pub enum BoundPolicy<P> {
    /// Total item count known up front
    ExactItemCount(u64),
    /// Total page count known up front
    ExactPageCount(u64),
    /// Item count computed once, on first need
    LazyItemCount(Box<dyn CountSupplier>),
    /// Discover the page count by prefetching the first page
    Discover(Option<Box<dyn TotalPagesExtractor<P>>>),
}

impl<P> BoundPolicy<P> {
    /// Discover mode with the given total pages extractor
    pub fn discover(extractor: impl TotalPagesExtractor<P> + 'static) -> Self {
        Self::Discover(Some(Box::new(extractor)))
    }

    /// Lazily counted mode with the given supplier
    pub fn lazy_item_count(supplier: impl CountSupplier + 'static) -> Self {
        Self::LazyItemCount(Box::new(supplier))
    }

    /// Short name used in logs and plans
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExactItemCount(_) => "exact_items",
            Self::ExactPageCount(_) => "exact_pages",
            Self::LazyItemCount(_) => "lazy_items",
            Self::Discover(_) => "discover",
        }
    }
}

impl<T> BoundPolicy<PageResult<T>> {
    /// Discover mode reading `total_pages` from [`PageResult`] pages
    pub fn discover_from_results() -> Self {
        Self::discover(PageResultTotalPages)
    }
}

impl<P> fmt::Debug for BoundPolicy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactItemCount(n) => f.debug_tuple("ExactItemCount").field(n).finish(),
            Self::ExactPageCount(n) => f.debug_tuple("ExactPageCount").field(n).finish(),
            Self::LazyItemCount(_) => f.write_str("LazyItemCount"),
            Self::Discover(extractor) => f
                .debug_struct("Discover")
                .field("has_extractor", &extractor.is_some())
                .finish(),
        }
    }
}

// ============================================================================
// Last Page Signal
// ============================================================================

/// The single signal a cursor uses to recognise the last page
pub enum LastPageSignal<P> {
    /// A page holding fewer items than the page size is the last one
    ShortPage,
    /// The backend flags the last page explicitly
    BackendFlag(Box<dyn LastPageExtractor<P>>),
}

impl<P> Default for LastPageSignal<P> {
    fn default() -> Self {
        Self::ShortPage
    }
}

impl<P> LastPageSignal<P> {
    /// Backend flag signal with the given extractor
    pub fn backend_flag(extractor: impl LastPageExtractor<P> + 'static) -> Self {
        Self::BackendFlag(Box::new(extractor))
    }
}

impl<T> LastPageSignal<PageResult<T>> {
    /// Backend flag signal reading `is_last` from [`PageResult`] pages
    pub fn flag_from_results() -> Self {
        Self::backend_flag(PageResultIsLast)
    }
}

impl<P> fmt::Debug for LastPageSignal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShortPage => f.write_str("ShortPage"),
            Self::BackendFlag(_) => f.write_str("BackendFlag"),
        }
    }
}

// ============================================================================
// Page Source
// ============================================================================

/// A page after extraction, ready to hand to a consumer
#[derive(Debug)]
pub(crate) struct LoadedPage<T> {
    pub items: Vec<T>,
    /// Set only under [`LastPageSignal::BackendFlag`]
    pub last_flag: Option<bool>,
}

/// Collaborators shared by a cursor and every child split off it
pub(crate) struct PageSource<P, T> {
    fetcher: Box<dyn PageFetcher<P>>,
    items: Box<dyn ItemExtractor<P, T>>,
    signal: LastPageSignal<P>,
}

impl<P, T> PageSource<P, T> {
    pub fn new(
        fetcher: Box<dyn PageFetcher<P>>,
        items: Box<dyn ItemExtractor<P, T>>,
        signal: LastPageSignal<P>,
    ) -> Self {
        Self {
            fetcher,
            items,
            signal,
        }
    }

    pub fn fetch(&self, request: PageRequest) -> Result<P> {
        tracing::debug!(page = request.index, size = request.size, "Fetching page");
        self.fetcher.fetch(request)
    }

    /// Extract items and, when configured, the last-page flag
    pub fn open(&self, page: P) -> Result<LoadedPage<T>> {
        let last_flag = match &self.signal {
            LastPageSignal::ShortPage => None,
            LastPageSignal::BackendFlag(extractor) => Some(
                extractor
                    .is_last(&page)
                    .ok_or_else(|| Error::extraction("page carries no last-page flag"))?,
            ),
        };
        let items = self.items.extract(page)?;
        Ok(LoadedPage { items, last_flag })
    }

    pub fn load(&self, request: PageRequest) -> Result<LoadedPage<T>> {
        let page = self.fetch(request)?;
        self.open(page)
    }

    pub fn is_last_page(&self, page: &LoadedPage<T>, page_size: u64) -> bool {
        match page.last_flag {
            Some(flag) => flag,
            None => (page.items.len() as u64) < page_size,
        }
    }

    pub fn signal(&self) -> &LastPageSignal<P> {
        &self.signal
    }
}
