//! In-memory record source

use crate::error::{Error, Result};
use crate::pagination::{CountSupplier, PageFetcher};
use crate::types::{pages_for, JsonValue, PageRequest, PageResult};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Pages over a vector of records
///
/// Clones share the records and the fetch log, so a handle kept by the
/// caller sees every fetch the cursor made.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Arc<Vec<JsonValue>>,
    fetches: Arc<Mutex<BTreeMap<u64, usize>>>,
}

impl MemorySource {
    /// Create a source over the given records
    pub fn new(records: Vec<JsonValue>) -> Self {
        Self {
            records: Arc::new(records),
            fetches: Arc::default(),
        }
    }

    /// Load records from a JSON array file or a JSON Lines file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let records = parse_records(&content)?;
        tracing::debug!(path = %path.display(), records = records.len(), "Loaded records");
        Ok(Self::new(records))
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the source holds no records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total fetch calls so far
    pub fn fetch_count(&self) -> usize {
        self.log().values().sum()
    }

    /// Fetch calls made for one page index
    pub fn fetches_of(&self, page: u64) -> usize {
        self.log().get(&page).copied().unwrap_or(0)
    }

    /// Page indices fetched at least once, ascending
    pub fn fetched_pages(&self) -> Vec<u64> {
        self.log().keys().copied().collect()
    }

    fn log(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, usize>> {
        self.fetches.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PageFetcher<PageResult<JsonValue>> for MemorySource {
    fn fetch(&self, request: PageRequest) -> Result<PageResult<JsonValue>> {
        *self.log().entry(request.index).or_default() += 1;

        let total = self.records.len();
        let start = usize::try_from(request.offset()).unwrap_or(usize::MAX).min(total);
        let end = usize::try_from(request.size)
            .map_or(total, |size| start.saturating_add(size))
            .min(total);

        Ok(PageResult::new(self.records[start..end].to_vec())
            .with_is_last(end == total)
            .with_total_pages(pages_for(total as u64, request.size)))
    }
}

impl CountSupplier for MemorySource {
    fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }
}

/// Parse a JSON array, or one JSON value per non-empty line
fn parse_records(content: &str) -> Result<Vec<JsonValue>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            serde_json::from_str(line)
                .map_err(|e| Error::config(format!("Invalid JSON on line {}: {e}", number + 1)))
        })
        .collect()
}
