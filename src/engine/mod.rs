//! Execution engine module
//!
//! Drives a cursor into a record sink.
//!
//! # Overview
//!
//! - [`ExportJob`] - runs one export, sequentially or split across workers
//! - [`ExportMode`] - sequential or parallel with a worker limit
//! - [`ExportReport`] - counts and timing of a finished export
//!
//! Pages are fetched on tokio blocking workers, since fetchers block, one
//! cursor page at a time, and handed through a bounded channel to a single writer that owns the sink.

mod types;

pub use types::{ExportMode, ExportReport};

use crate::error::{Error, Result};
use crate::output::RecordSink;
use crate::pagination::PageCursor;
use crate::stream::{decompose_fully, Traversal, TraversalUnit};
use crate::types::JsonValue;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default number of pages buffered between fetch workers and the writer
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

type PageSender = mpsc::Sender<Vec<JsonValue>>;

/// One export of a cursor's records into a sink
///
/// The first failure aborts the job. Records already handed to the sink stay
/// written.
pub struct ExportJob<P> {
    cursor: PageCursor<P, JsonValue>,
    mode: ExportMode,
    channel_capacity: usize,
}

impl<P: 'static> ExportJob<P> {
    /// Create a sequential export of `cursor`
    pub fn new(cursor: PageCursor<P, JsonValue>) -> Self {
        Self {
            cursor,
            mode: ExportMode::Sequential,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the execution mode
    #[must_use]
    pub fn with_mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how many pages may wait for the writer
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Execution mode
    pub fn mode(&self) -> ExportMode {
        self.mode
    }

    /// Run the export to completion
    pub async fn run(self, sink: Box<dyn RecordSink>) -> Result<ExportReport> {
        if self.mode.workers() == 0 {
            return Err(Error::config("parallel export needs at least one worker"));
        }

        let started_at = Utc::now();
        info!(
            mode = ?self.mode,
            page_size = self.cursor.page_size(),
            bound = self.cursor.bound_kind(),
            "Starting export"
        );

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let writer = tokio::task::spawn_blocking(move || write_pages(rx, sink));

        let produced = match self.mode {
            ExportMode::Sequential => produce_sequential(self.cursor, tx).await,
            ExportMode::Parallel { workers } => produce_parallel(self.cursor, workers, tx).await,
        };

        // A failed sink closes the channel, so its error explains the producer's.
        let records = writer.await.map_err(worker_failed)??;
        let progress = produced?;

        let report = ExportReport {
            records,
            pages: progress.pages,
            units: progress.units,
            mode: self.mode,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            records = report.records,
            pages = report.pages,
            units = report.units,
            duration_ms = report.duration().num_milliseconds(),
            "Export finished"
        );
        Ok(report)
    }
}

impl<P> std::fmt::Debug for ExportJob<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportJob")
            .field("cursor", &self.cursor)
            .field("mode", &self.mode)
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Progress {
    pages: usize,
    units: usize,
}

/// Single owner of the sink: write pages in arrival order, then flush
fn write_pages(
    mut rx: mpsc::Receiver<Vec<JsonValue>>,
    mut sink: Box<dyn RecordSink>,
) -> Result<usize> {
    while let Some(page) = rx.blocking_recv() {
        sink.write_page(&page)?;
    }
    sink.finish()
}

async fn produce_sequential<P: 'static>(
    cursor: PageCursor<P, JsonValue>,
    tx: PageSender,
) -> Result<Progress> {
    tokio::task::spawn_blocking(move || {
        let unit = TraversalUnit::from(cursor);
        let pages = drain_unit(&unit, &tx, &AtomicBool::new(false))?;
        Ok(Progress { pages, units: 1 })
    })
    .await
    .map_err(worker_failed)?
}

async fn produce_parallel<P: 'static>(
    cursor: PageCursor<P, JsonValue>,
    workers: usize,
    tx: PageSender,
) -> Result<Progress> {
    // Discovery may fetch, so decomposition blocks too.
    let units = tokio::task::spawn_blocking(move || decompose_fully(cursor))
        .await
        .map_err(worker_failed)??;
    let unit_count = units.len();
    info!(units = unit_count, workers, "Decomposed cursor");

    let abort = Arc::new(AtomicBool::new(false));
    let pages = futures::stream::iter(units)
        .map(|unit| {
            let tx = tx.clone();
            let abort = Arc::clone(&abort);
            async move {
                let result = tokio::task::spawn_blocking({
                    let abort = Arc::clone(&abort);
                    move || drain_unit(&unit, &tx, &abort)
                })
                .await
                .map_err(worker_failed)
                .and_then(|r| r);
                if result.is_err() {
                    abort.store(true, Ordering::Release);
                }
                result
            }
        })
        .buffer_unordered(workers)
        .try_fold(0, |total, pages| async move { Ok(total + pages) })
        .await?;

    Ok(Progress {
        pages,
        units: unit_count,
    })
}

/// Drain one unit page by page; stops early once another unit has failed
fn drain_unit<P>(
    unit: &TraversalUnit<P, JsonValue>,
    tx: &PageSender,
    abort: &AtomicBool,
) -> Result<usize> {
    let mut pages = 0;
    loop {
        if abort.load(Ordering::Acquire) {
            warn!(
                page = unit.first_page(),
                kind = unit.kind(),
                "Unit abandoned after failure elsewhere"
            );
            return Ok(pages);
        }

        let mut page = Vec::new();
        let more = unit.produce_next(&mut |record| page.push(record)).map_err(|e| {
            warn!(error = %e, page = unit.first_page(), kind = unit.kind(), "Unit aborted");
            e
        })?;
        if !page.is_empty() {
            send_page(tx, page)?;
            pages += 1;
        }
        if !more {
            debug!(page = unit.first_page(), kind = unit.kind(), pages, "Unit drained");
            return Ok(pages);
        }
    }
}

fn send_page(tx: &PageSender, page: Vec<JsonValue>) -> Result<()> {
    tx.blocking_send(page)
        .map_err(|_| Error::output("record sink closed before export finished"))
}

fn worker_failed(e: tokio::task::JoinError) -> Error {
    Error::Other(format!("Export worker failed: {e}"))
}
