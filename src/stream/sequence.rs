//! Sequential, lazily fetched item iterator

use super::traversal::{Capabilities, Traversal};
use crate::error::{Error, Result};
use crate::pagination::PageCursor;
use std::collections::VecDeque;
use std::iter::FusedIterator;

/// Pull-based iterator over one traversal unit
///
/// Holds at most one page in memory. Yields `Err` once if a fetch fails,
/// after the items delivered before the failure, and then ends.
pub struct LazySequence<U: Traversal> {
    unit: U,
    buffer: VecDeque<U::Item>,
    failed: Option<Error>,
    exhausted: bool,
}

impl<U: Traversal> LazySequence<U> {
    /// Wrap a traversal unit
    pub fn new(unit: U) -> Self {
        Self {
            unit,
            buffer: VecDeque::new(),
            failed: None,
            exhausted: false,
        }
    }

    /// Upper bound on items the underlying unit yields
    pub fn size_estimate(&self) -> Result<u64> {
        self.unit.size_estimate()
    }

    /// Capability descriptor of the underlying unit
    pub fn capabilities(&self) -> Capabilities {
        self.unit.capabilities()
    }

    /// Split work off the underlying unit into its own sequence
    pub fn try_split(&self) -> Result<Option<LazySequence<U::Unit>>> {
        if self.exhausted {
            return Ok(None);
        }
        Ok(self.unit.try_decompose()?.map(LazySequence::new))
    }

    /// Borrow the underlying unit
    pub fn unit(&self) -> &U {
        &self.unit
    }
}

impl<U: Traversal> Iterator for LazySequence<U> {
    type Item = Result<U::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            if let Some(e) = self.failed.take() {
                return Some(Err(e));
            }
            if self.exhausted {
                return None;
            }

            let buffer = &mut self.buffer;
            match self.unit.produce_next(&mut |item| buffer.push_back(item)) {
                Ok(more) => self.exhausted = !more,
                Err(e) => {
                    self.exhausted = true;
                    self.failed = Some(e);
                }
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.buffer.len(), None)
    }
}

impl<U: Traversal> FusedIterator for LazySequence<U> {}

impl<P, T> PageCursor<P, T> {
    /// Consume the cursor as a sequential iterator
    pub fn into_sequence(self) -> LazySequence<Self> {
        LazySequence::new(self)
    }
}
