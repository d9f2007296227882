//! Engine types
//!
//! Execution mode and the report returned by an export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an export drives its cursor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportMode {
    /// One worker walks the cursor page by page
    #[default]
    Sequential,
    /// The cursor is split into pages drained by up to `workers` blocking workers
    Parallel {
        /// Maximum units drained at once
        workers: usize,
    },
}

impl ExportMode {
    /// Maximum concurrent fetches
    pub fn workers(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Parallel { workers } => *workers,
        }
    }

    /// Check if this mode splits the cursor
    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel { .. })
    }
}

/// Outcome of a completed export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportReport {
    /// Records written to the sink
    pub records: usize,
    /// Non-empty pages written to the sink
    pub pages: usize,
    /// Traversal units the cursor was drained as
    pub units: usize,
    /// Mode the export ran in
    pub mode: ExportMode,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// Completion time
    pub finished_at: DateTime<Utc>,
}

impl ExportReport {
    /// Wall-clock duration
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Records per second, zero for instantaneous exports
    pub fn records_per_second(&self) -> f64 {
        let millis = self.duration().num_milliseconds();
        if millis <= 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.records as f64 * 1000.0 / millis as f64
        }
    }
}
