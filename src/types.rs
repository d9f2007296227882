//! Common types used throughout Solidafy Pagestream
//!
//! This module contains shared type definitions, type aliases,
//! and the page value objects exchanged with fetch collaborators.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Page Request
// ============================================================================

/// Address of one page: zero-based index and fixed page size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index
    pub index: u64,
    /// Number of items per page
    pub size: u64,
}

impl PageRequest {
    /// Create a page request
    pub fn new(index: u64, size: u64) -> Self {
        Self { index, size }
    }

    /// Offset of the first item of this page
    pub fn offset(&self) -> u64 {
        self.index.saturating_mul(self.size)
    }

    /// Request for the page after this one
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            index: self.index + 1,
            size: self.size,
        }
    }
}

// ============================================================================
// Page Result
// ============================================================================

/// One fetched page as reported by a source
///
/// Sources that do not know the total extent leave `total_pages` empty;
/// sources without an explicit end marker leave `is_last` empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    /// Items on this page, in source order
    pub items: Vec<T>,
    /// Backend-supplied "this is the last page" flag
    #[serde(default)]
    pub is_last: Option<bool>,
    /// Backend-supplied total page count
    #[serde(default)]
    pub total_pages: Option<u64>,
}

impl<T> PageResult<T> {
    /// Create a page holding only items
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            is_last: None,
            total_pages: None,
        }
    }

    /// Attach the last-page flag
    #[must_use]
    pub fn with_is_last(mut self, is_last: bool) -> Self {
        self.is_last = Some(is_last);
        self
    }

    /// Attach the total page count
    #[must_use]
    pub fn with_total_pages(mut self, total_pages: u64) -> Self {
        self.total_pages = Some(total_pages);
        self
    }

    /// Number of items on this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the page is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the page and return its items
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

/// Number of pages needed to hold `items` at `page_size`, never less than one
pub fn pages_for(items: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        return 1;
    }
    items.div_ceil(page_size).max(1)
}
