//! Pagination module
//!
//! Supports: exact item count, exact page count, lazily counted and
//! discovered (prefetched) bounds
//!
//! # Overview
//!
//! A [`PageCursor`] walks a paginated source one page at a time. It can also
//! be split, one page per split, into [`ChildRange`]s that separate workers
//! consume independently. Only page-position state lives in the cursor;
//! fetching and item extraction are delegated to collaborators.

mod child;
mod cursor;
mod prefetch;
mod types;

pub use child::ChildRange;
pub use cursor::{PageCursor, PageCursorBuilder};
pub use prefetch::PrefetchCache;
pub use types::{
    BoundPolicy, CountSupplier, ItemExtractor, LastPageExtractor, LastPageSignal, PageFetcher,
    PageResultIsLast, PageResultItems, PageResultTotalPages, TotalPagesExtractor,
};

#[cfg(test)]
mod tests;
