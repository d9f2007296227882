//! Output module
//!
//! Record sinks for exported items.
//!
//! # Overview
//!
//! - [`CsvSink`] - CSV with a header row, via the `csv` crate
//! - [`JsonLinesSink`] - one JSON object per line
//! - [`open_sink`] - pick a sink by [`OutputFormat`], file or stdout

mod writer;

pub use writer::{open_sink, CsvSink, JsonLinesSink, OutputFormat, RecordSink};
