//! Rayon bridge: decompose a cursor across the global thread pool
//!
//! Rayon asks the producer to split whenever a worker is idle; each split
//! hands one page to the thief. Errors travel as items so a failed fetch
//! surfaces in whatever the caller collects into.

use super::traversal::{Traversal, TraversalUnit};
use crate::error::{Error, Result};
use crate::pagination::PageCursor;
use rayon::iter::plumbing::{bridge_unindexed, Folder, UnindexedConsumer, UnindexedProducer};
use rayon::iter::ParallelIterator;

/// Parallel iterator over a cursor's items
///
/// No cross-page order is guaranteed.
#[derive(Debug)]
pub struct ParPages<P, T> {
    cursor: PageCursor<P, T>,
}

impl<P, T> ParPages<P, T> {
    /// Wrap a cursor
    pub fn new(cursor: PageCursor<P, T>) -> Self {
        Self { cursor }
    }
}

impl<P, T: Send> ParallelIterator for ParPages<P, T> {
    type Item = Result<T>;

    fn drive_unindexed<C>(self, consumer: C) -> C::Result
    where
        C: UnindexedConsumer<Self::Item>,
    {
        bridge_unindexed(PageProducer::Unit(self.cursor.into()), consumer)
    }
}

enum PageProducer<P, T> {
    Unit(TraversalUnit<P, T>),
    Failed(Error),
}

impl<P, T: Send> UnindexedProducer for PageProducer<P, T> {
    type Item = Result<T>;

    fn split(self) -> (Self, Option<Self>) {
        match self {
            Self::Unit(unit) => match unit.try_decompose() {
                Ok(Some(child)) => (Self::Unit(unit), Some(Self::Unit(child))),
                Ok(None) => (Self::Unit(unit), None),
                Err(e) => {
                    tracing::warn!(error = %e, "Split failed, abandoning remaining pages");
                    (Self::Failed(e), None)
                }
            },
            failed @ Self::Failed(_) => (failed, None),
        }
    }

    fn fold_with<F>(self, mut folder: F) -> F
    where
        F: Folder<Self::Item>,
    {
        let unit = match self {
            Self::Unit(unit) => unit,
            Self::Failed(e) => return folder.consume(Err(e)),
        };

        let mut page = Vec::new();
        while !folder.full() {
            let outcome = unit.produce_next(&mut |item| page.push(item));
            folder = folder.consume_iter(page.drain(..).map(Ok));
            match outcome {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(error = %e, page = unit.first_page(), "Unit aborted");
                    folder = folder.consume(Err(e));
                    break;
                }
            }
        }
        folder
    }
}

impl<P, T> PageCursor<P, T> {
    /// Consume the cursor as a rayon parallel iterator
    pub fn par_items(self) -> ParPages<P, T> {
        ParPages::new(self)
    }
}
