//! Stream adapters
//!
//! Bridges cursors to the runtimes that consume them.
//!
//! # Overview
//!
//! - [`Traversal`] - the three operations a runtime drives (`produce_next`,
//!   `try_decompose`, `size_estimate`) plus a [`Capabilities`] descriptor
//! - [`LazySequence`] - sequential iterator, one page buffered at a time
//! - [`ParPages`] - rayon parallel iterator splitting one page per steal
//! - [`decompose_fully`] - eager split into independent units for a worker pool

mod parallel;
mod sequence;
mod traversal;

pub use parallel::ParPages;
pub use sequence::LazySequence;
pub use traversal::{decompose_fully, Capabilities, Traversal, TraversalUnit};
