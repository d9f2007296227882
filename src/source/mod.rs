//! Page sources
//!
//! Concrete [`PageFetcher`](crate::pagination::PageFetcher) collaborators.
//! Every source yields [`PageResult<JsonValue>`](crate::types::PageResult)
//! pages carrying the items, the total page count when the backend knows it,
//! and a last-page flag.
//!
//! - [`MemorySource`] - records held in memory or loaded from a JSON file
//! - [`HttpPageSource`] - JSON HTTP endpoint with page/size query parameters
//! - [`DuckDbSource`] - SQL query paged with `LIMIT`/`OFFSET`

mod database;
mod http;
mod memory;
mod rate_limit;

pub use database::{DuckDbSource, DuckDbSourceConfig};
pub use http::{lookup, HttpPageSource, HttpSourceConfig};
pub use memory::MemorySource;
pub use rate_limit::{RateLimiter, RateLimiterConfig};
