//! Traversal contract between cursors and whatever runtime consumes them

use crate::error::Result;
use crate::pagination::{ChildRange, PageCursor};
use serde::Serialize;

/// Properties a consuming runtime may rely on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// Items within one unit arrive in page-then-within-page order
    pub ordered: bool,
    /// A size estimate is available before traversal completes
    pub sized: bool,
    /// Units produced by decomposition are sized too
    pub sub_sized: bool,
    /// Disjoint units may be consumed concurrently
    pub concurrent: bool,
    /// A unit cannot be replayed once consumed
    pub single_pass: bool,
}

impl Capabilities {
    /// Capabilities of a splittable cursor
    pub const CURSOR: Self = Self {
        ordered: true,
        sized: true,
        sub_sized: true,
        concurrent: true,
        single_pass: true,
    };

    /// Capabilities of a single-page child
    pub const PAGE: Self = Self {
        ordered: true,
        sized: true,
        sub_sized: false,
        concurrent: false,
        single_pass: true,
    };
}

/// Three-operation interface every traversal unit exposes
pub trait Traversal {
    /// Item type handed to consumers
    type Item;
    /// Unit type produced by decomposition
    type Unit: Traversal<Item = Self::Item>;

    /// Hand the next page of items to `consume`; `false` when nothing remains
    fn produce_next(&self, consume: &mut dyn FnMut(Self::Item)) -> Result<bool>;

    /// Split off an independent unit, if any work can be split off
    fn try_decompose(&self) -> Result<Option<Self::Unit>>;

    /// Upper bound on items this unit yields
    fn size_estimate(&self) -> Result<u64>;

    /// Capability descriptor
    fn capabilities(&self) -> Capabilities;
}

impl<P, T> Traversal for PageCursor<P, T> {
    type Item = T;
    type Unit = ChildRange<P, T>;

    fn produce_next(&self, consume: &mut dyn FnMut(T)) -> Result<bool> {
        self.advance_one(consume)
    }

    fn try_decompose(&self) -> Result<Option<ChildRange<P, T>>> {
        self.split()
    }

    fn size_estimate(&self) -> Result<u64> {
        self.estimate_size()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::CURSOR
    }
}

impl<P, T> Traversal for ChildRange<P, T> {
    type Item = T;
    type Unit = ChildRange<P, T>;

    fn produce_next(&self, consume: &mut dyn FnMut(T)) -> Result<bool> {
        self.advance_one(consume)
    }

    fn try_decompose(&self) -> Result<Option<ChildRange<P, T>>> {
        Ok(self.split())
    }

    fn size_estimate(&self) -> Result<u64> {
        Ok(self.estimate_size())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PAGE
    }
}

// ============================================================================
// Traversal Unit
// ============================================================================

/// Either the cursor's remaining range or a page split off it
#[derive(Debug)]
pub enum TraversalUnit<P, T> {
    /// Whatever the cursor has not handed out yet
    Remainder(PageCursor<P, T>),
    /// One page split off the cursor
    Page(ChildRange<P, T>),
}

impl<P, T> TraversalUnit<P, T> {
    /// Short label for plans and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Remainder(_) => "remainder",
            Self::Page(_) => "page",
        }
    }

    /// First page index this unit covers
    pub fn first_page(&self) -> u64 {
        match self {
            Self::Remainder(cursor) => cursor.page_index(),
            Self::Page(child) => child.page_index(),
        }
    }

    /// Whether the unit holds its page from the discovery prefetch
    pub fn is_prefetched(&self) -> bool {
        match self {
            Self::Remainder(_) => false,
            Self::Page(child) => child.is_prefetched(),
        }
    }
}

impl<P, T> From<PageCursor<P, T>> for TraversalUnit<P, T> {
    fn from(cursor: PageCursor<P, T>) -> Self {
        Self::Remainder(cursor)
    }
}

impl<P, T> From<ChildRange<P, T>> for TraversalUnit<P, T> {
    fn from(child: ChildRange<P, T>) -> Self {
        Self::Page(child)
    }
}

impl<P, T> Traversal for TraversalUnit<P, T> {
    type Item = T;
    type Unit = TraversalUnit<P, T>;

    fn produce_next(&self, consume: &mut dyn FnMut(T)) -> Result<bool> {
        match self {
            Self::Remainder(cursor) => cursor.advance_one(consume),
            Self::Page(child) => child.advance_one(consume),
        }
    }

    fn try_decompose(&self) -> Result<Option<TraversalUnit<P, T>>> {
        match self {
            Self::Remainder(cursor) => Ok(cursor.split()?.map(Self::Page)),
            Self::Page(_) => Ok(None),
        }
    }

    fn size_estimate(&self) -> Result<u64> {
        match self {
            Self::Remainder(cursor) => cursor.estimate_size(),
            Self::Page(child) => Ok(child.estimate_size()),
        }
    }

    fn capabilities(&self) -> Capabilities {
        match self {
            Self::Remainder(_) => Capabilities::CURSOR,
            Self::Page(_) => Capabilities::PAGE,
        }
    }
}

/// Split a cursor until it refuses, returning every child and then the remainder
pub fn decompose_fully<P, T>(cursor: PageCursor<P, T>) -> Result<Vec<TraversalUnit<P, T>>> {
    let mut units = Vec::new();
    while let Some(child) = cursor.split()? {
        units.push(TraversalUnit::Page(child));
    }
    tracing::debug!(
        children = units.len(),
        remainder_page = cursor.page_index(),
        "Decomposed cursor"
    );
    units.push(TraversalUnit::Remainder(cursor));
    Ok(units)
}
