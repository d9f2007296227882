//! Record sinks
//!
//! Writes JSON records as CSV or JSON Lines, one page at a time.

use crate::error::{Error, Result};
use crate::types::JsonValue;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Export file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Comma separated values, header from the first record
    #[default]
    Csv,
    /// One JSON object per line
    #[serde(alias = "jsonlines", alias = "ndjson")]
    Jsonl,
}

impl OutputFormat {
    /// Conventional file extension
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Jsonl => "jsonl",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Destination for exported records
pub trait RecordSink: Send {
    /// Write one record
    fn write_record(&mut self, record: &JsonValue) -> Result<()>;

    /// Write a page of records in order
    fn write_page(&mut self, records: &[JsonValue]) -> Result<()> {
        records.iter().try_for_each(|record| self.write_record(record))
    }

    /// Records written so far
    fn records_written(&self) -> usize;

    /// Flush buffered output and return the record count
    fn finish(&mut self) -> Result<usize>;
}

// ============================================================================
// CSV
// ============================================================================

/// CSV sink
///
/// Columns are fixed by [`CsvSink::with_columns`] or taken from the keys of
/// the first record, in the order the source produced them. Keys missing from later records become empty cells;
/// keys not among the columns are dropped.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    columns: Option<Vec<String>>,
    header_written: bool,
    rows: usize,
}

impl<W: Write> CsvSink<W> {
    /// Create a sink writing to `writer`
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
            columns: None,
            header_written: false,
            rows: 0,
        }
    }

    /// Fix the column order
    #[must_use]
    pub fn with_columns(mut self, columns: Vec<String>) -> Self {
        self.columns = Some(columns);
        self
    }

    /// Columns in use, once known
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Flush and return the underlying writer
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::output(format!("Failed to flush CSV: {e}")))
    }
}

impl CsvSink<File> {
    /// Create a sink writing to a new file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())
            .map_err(|e| Error::output(format!("Failed to create file: {e}")))?;
        Ok(Self::new(file))
    }
}

impl<W: Write + Send> RecordSink for CsvSink<W> {
    fn write_record(&mut self, record: &JsonValue) -> Result<()> {
        let JsonValue::Object(fields) = record else {
            return Err(Error::output("CSV records must be JSON objects"));
        };

        let columns = self
            .columns
            .get_or_insert_with(|| fields.keys().cloned().collect());
        if !self.header_written {
            self.writer.write_record(columns.iter())?;
            self.header_written = true;
        }

        self.writer
            .write_record(columns.iter().map(|column| csv_cell(fields.get(column))))?;
        self.rows += 1;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

fn csv_cell(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// JSON Lines
// ============================================================================

/// JSON Lines sink
pub struct JsonLinesSink<W: Write> {
    writer: W,
    rows: usize,
}

impl<W: Write> JsonLinesSink<W> {
    /// Create a sink writing to `writer`
    pub fn new(writer: W) -> Self {
        Self { writer, rows: 0 }
    }

    /// Return the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<BufWriter<File>> {
    /// Create a sink writing to a new file at `path`
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path.as_ref())
            .map_err(|e| Error::output(format!("Failed to create file: {e}")))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send> RecordSink for JsonLinesSink<W> {
    fn write_record(&mut self, record: &JsonValue) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.rows += 1;
        Ok(())
    }

    fn records_written(&self) -> usize {
        self.rows
    }

    fn finish(&mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// Open a sink for `format`, writing to `path` or to stdout
pub fn open_sink(format: OutputFormat, path: Option<&Path>) -> Result<Box<dyn RecordSink>> {
    let sink: Box<dyn RecordSink> = match (format, path) {
        (OutputFormat::Csv, Some(path)) => Box::new(CsvSink::create(path)?),
        (OutputFormat::Csv, None) => Box::new(CsvSink::new(std::io::stdout())),
        (OutputFormat::Jsonl, Some(path)) => Box::new(JsonLinesSink::create(path)?),
        (OutputFormat::Jsonl, None) => Box::new(JsonLinesSink::new(std::io::stdout())),
    };
    Ok(sink)
}
