// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Solidafy Pagestream
//!
//! Streams a paginated result set page by page, either as a lazy sequential
//! iterator or split into independent page units for a worker pool.
//!
//! ## Features
//!
//! - **Claim-before-fetch cursor**: every page is fetched at most once, even
//!   while workers split the cursor concurrently
//! - **Bound policies**: exact item count, exact page count, lazy count, or
//!   discovery from a prefetched first page
//! - **Sources**: JSON files, HTTP endpoints, DuckDB queries
//! - **Export**: CSV or JSON Lines, sequential or parallel
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use solidafy_pagestream::pagination::{BoundPolicy, PageCursor};
//! use solidafy_pagestream::source::MemorySource;
//!
//! let source = MemorySource::from_file("users.jsonl")?;
//! let cursor = PageCursor::for_results(100, source, BoundPolicy::discover_from_results())
//!     .build()?;
//!
//! for record in cursor.into_sequence() {
//!     println!("{}", record?);
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         ExportJob                               │
//! │  sequential: LazySequence      parallel: decompose_fully        │
//! │  writer task owns the RecordSink (CSV / JSON Lines)             │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────┬───────────────┴───────────────┬─────────────────┐
//! │   Source     │          PageCursor           │     Stream      │
//! ├──────────────┼───────────────────────────────┼─────────────────┤
//! │ File         │ advance_one / split           │ LazySequence    │
//! │ HTTP         │ BoundPolicy                   │ TraversalUnit   │
//! │ DuckDB       │ PrefetchCache / ChildRange    │ ParPages        │
//! └──────────────┴───────────────────────────────┴─────────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Page cursor, child ranges and bound policies
pub mod pagination;

/// Sequential and parallel adapters over cursors
pub mod stream;

/// Page sources: files, HTTP, DuckDB
pub mod source;

/// CSV and JSON Lines sinks
pub mod output;

/// Export execution engine
pub mod engine;

/// Export configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{ExportConfig, RecordCursor};
pub use engine::{ExportJob, ExportMode, ExportReport};
pub use pagination::{BoundPolicy, LastPageSignal, PageCursor};
pub use stream::{decompose_fully, LazySequence, TraversalUnit};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
